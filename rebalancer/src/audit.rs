//! JSONL audit trail logging.
//!
//! Every cycle, liquidation and report appends events to an audit.jsonl
//! file, one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::error;
use serde::Serialize;

use crate::botapi::{BalanceSummary, DailyProfit};
use crate::error::Result;
use crate::liquidate::Liquidation;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
///
/// Bot threads share one log; each event is written and flushed under a
/// lock so lines never interleave.
pub struct AuditLog {
    writer: Mutex<BufWriter<std::fs::File>>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)?;

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{json}")?;
        writer.flush()?;
        Ok(())
    }

    /// Log and keep going: a failed audit write never stops a cycle.
    pub fn record(&self, event: &'static str, data: serde_json::Value) {
        if let Err(e) = self.log(event, data) {
            error!("Failed to write {event} audit event: {e}");
        }
    }
}

pub fn log_cycle_started(audit: &AuditLog, bot: &str, full_reset: bool, dry_run: bool) {
    audit.record(
        "cycle_started",
        serde_json::json!({
            "bot": bot,
            "full_reset": full_reset,
            "dry_run": dry_run,
        }),
    );
}

pub fn log_cycle_completed(audit: &AuditLog, bot: &str) {
    audit.record("cycle_completed", serde_json::json!({ "bot": bot }));
}

pub fn log_cycle_failed(audit: &AuditLog, bot: &str, step: &str, error: &str) {
    audit.record(
        "cycle_failed",
        serde_json::json!({
            "bot": bot,
            "step": step,
            "error": error,
        }),
    );
}

/// One `liquidation_attempt` per attempt, then the summary events.
pub fn log_liquidation(audit: &AuditLog, bot: &str, liquidation: &Liquidation) {
    for attempt in &liquidation.attempts {
        audit.record(
            "liquidation_attempt",
            serde_json::json!({
                "bot": bot,
                "asset": attempt.asset.as_str(),
                "quantity": attempt.quantity.to_string(),
                "precision": attempt.precision,
                "outcome": attempt.outcome.to_string(),
            }),
        );
    }

    if !liquidation.converted.is_empty() || !liquidation.unsold.is_empty() {
        audit.record(
            "dust_converted",
            serde_json::json!({
                "bot": bot,
                "converted": &liquidation.converted,
                "unsold": &liquidation.unsold,
                "received": liquidation.dust_received.to_string(),
            }),
        );
    }

    audit.record(
        "liquidation_completed",
        serde_json::json!({
            "bot": bot,
            "sold": &liquidation.sold,
            "unfilled": &liquidation.unfilled,
            "unsold": &liquidation.unsold,
            "skipped": &liquidation.skipped,
            "attempts": liquidation.attempts.len(),
        }),
    );
}

pub fn log_bot_report(
    audit: &AuditLog,
    bot: &str,
    date: &str,
    daily: &DailyProfit,
    balance: &BalanceSummary,
) -> Result<()> {
    let latest = daily.latest();
    audit.log(
        "bot_report",
        serde_json::json!({
            "bot": bot,
            "date": date,
            "profit_date": latest.map(|d| d.date.as_str()),
            "daily_profit": latest.map(|d| d.abs_profit),
            "trade_count": latest.map(|d| d.trade_count),
            "stake_currency": daily.stake_currency,
            "balance_total": balance.total,
        }),
    )
}
