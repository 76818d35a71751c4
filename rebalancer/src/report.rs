//! Profit reports: daily profit and balance of each bot, appended to the
//! audit trail.

use std::fmt;

use chrono::NaiveDate;
use log::debug;

use crate::audit::{self, AuditLog};
use crate::botapi::BotControl;
use crate::error::Result;

/// One bot's figures for one report run.
#[derive(Debug, Clone, PartialEq)]
pub struct BotReport {
    pub bot: String,
    pub date: NaiveDate,
    pub daily_profit: Option<f64>,
    pub balance_total: f64,
    pub stake_currency: String,
}

impl fmt::Display for BotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let profit = match self.daily_profit {
            Some(p) => format!("{p:+.8}"),
            None => "-".to_string(),
        };
        write!(
            f,
            "  {:12} {}  profit {:>12} {:4}  balance {:>12.8} {}",
            self.bot, self.date, profit, self.stake_currency, self.balance_total, self.stake_currency
        )
    }
}

/// Poll `api` and append a `bot_report` event.
pub fn report_bot(
    audit: &AuditLog,
    bot: &str,
    api: &dyn BotControl,
    date: NaiveDate,
) -> Result<BotReport> {
    debug!("Collecting report for {bot}");
    let daily = api.daily()?;
    let balance = api.balance()?;

    audit::log_bot_report(audit, bot, &date.to_string(), &daily, &balance)?;

    let stake_currency = if daily.stake_currency.is_empty() {
        balance.stake.clone()
    } else {
        daily.stake_currency.clone()
    };
    Ok(BotReport {
        bot: bot.to_string(),
        date,
        daily_profit: daily.latest().map(|d| d.abs_profit),
        balance_total: balance.total,
        stake_currency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::botapi::{BalanceSummary, DailyProfit, DailyRow};
    use crate::error::Error;

    struct Reporting {
        daily: Option<DailyProfit>,
    }

    impl BotControl for Reporting {
        fn ping(&self) -> Result<()> {
            Ok(())
        }

        fn stop(&self) -> Result<String> {
            unimplemented!()
        }

        fn daily(&self) -> Result<DailyProfit> {
            self.daily
                .clone()
                .ok_or_else(|| Error::BotApi("daily returned 500".into()))
        }

        fn balance(&self) -> Result<BalanceSummary> {
            Ok(BalanceSummary {
                currencies: Vec::new(),
                total: 0.75,
                stake: "BTC".into(),
            })
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
    }

    #[test]
    fn report_is_written_to_audit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let audit = AuditLog::open(&path).unwrap();
        let api = Reporting {
            daily: Some(DailyProfit {
                data: vec![DailyRow {
                    date: "2024-03-02".into(),
                    abs_profit: 0.0012,
                    trade_count: 4,
                }],
                stake_currency: "BTC".into(),
            }),
        };

        let report = report_bot(&audit, "bot01", &api, date()).unwrap();
        assert_eq!(report.daily_profit, Some(0.0012));
        assert_eq!(report.stake_currency, "BTC");

        let line = std::fs::read_to_string(&path).unwrap();
        let event: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(event["event"], "bot_report");
        assert_eq!(event["bot"], "bot01");
        assert_eq!(event["date"], "2024-03-02");
        assert_eq!(event["balance_total"], 0.75);
    }

    #[test]
    fn api_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let audit = AuditLog::open(&path).unwrap();

        let err = report_bot(&audit, "bot01", &Reporting { daily: None }, date());
        assert!(matches!(err, Err(Error::BotApi(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn empty_history_has_no_profit() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(&dir.path().join("audit.jsonl")).unwrap();
        let api = Reporting {
            daily: Some(DailyProfit {
                data: Vec::new(),
                stake_currency: String::new(),
            }),
        };

        let report = report_bot(&audit, "bot01", &api, date()).unwrap();
        assert_eq!(report.daily_profit, None);
        assert_eq!(report.stake_currency, "BTC");
        assert!(report.to_string().contains("profit            - BTC"));
    }
}
