//! Command handlers: update, liquidate, balances, status, report.
//!
//! These tie the components together for the CLI.

use std::thread;

use chrono::Utc;
use freqkeeper::{Asset, DustSet, PriceTable, SellPlan};
use log::{error, info, warn};

use crate::alert::{self, AlertSink};
use crate::audit::{self, AuditLog};
use crate::botapi::{BotApi, BotControl};
use crate::broker::connect_venue;
use crate::config::{BotConfig, Config};
use crate::cycle::{self, BotSession, CycleFailure, CycleOutcome, HttpConfigSource, Step};
use crate::error::{Error, Result};
use crate::liquidate;
use crate::report;
use crate::shell::OpenSsh;

/// Options for a manual liquidation.
pub struct LiquidateOptions {
    pub dry_run: bool,
    pub force: bool,
}

/// Bots selected by `--bot`, or all of them.
pub fn select_bots<'a>(config: &'a Config, only: Option<&str>) -> Result<Vec<&'a BotConfig>> {
    match only {
        Some(name) => Ok(vec![config.bot(name)?]),
        None => Ok(config.bots.iter().collect()),
    }
}

/// Run the update cycle for each selected bot, one thread per bot.
pub fn run_update(config: &Config, only: Option<&str>) -> Result<()> {
    let bots = select_bots(config, only)?;
    let audit = AuditLog::open(&config.audit_path())?;
    let alerts = alert::from_config(config.alerts.as_ref())?;
    let alerts: &dyn AlertSink = alerts.as_ref();

    let results: Vec<(String, std::result::Result<CycleOutcome, CycleFailure>)> =
        thread::scope(|scope| {
            let handles: Vec<_> = bots
                .iter()
                .map(|bot| {
                    let audit = &audit;
                    let handle = scope.spawn(move || update_bot(config, bot, alerts, audit));
                    (bot.name.clone(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(CycleFailure {
                            step: Step::Setup,
                            error: Error::Aborted(format!("{name} update thread panicked")),
                        })
                    });
                    (name, result)
                })
                .collect()
        });

    println!("\nUPDATE RESULTS:");
    let mut failed = 0;
    for (name, result) in &results {
        match result {
            Ok(outcome) => {
                let note = if outcome.stopped_cleanly { "" } else { " (stop not confirmed)" };
                println!("  {name:12} OK{note}");
                if let Some(liquidation) = &outcome.liquidation {
                    print!("{liquidation}");
                }
            }
            Err(failure) => {
                println!("{}", failure_line(name, failure));
                failed += 1;
            }
        }
    }
    println!("Audit logged to {}", config.audit_path().display());

    if failed > 0 {
        return Err(Error::BotsFailed {
            failed,
            total: results.len(),
        });
    }
    Ok(())
}

/// Summary line for a failed cycle. Venue outages are flagged so they are
/// not mistaken for a broken bot.
fn failure_line(name: &str, failure: &CycleFailure) -> String {
    let cause = if cycle::is_venue_outage(failure) {
        " [venue unavailable]"
    } else {
        ""
    };
    format!(
        "  {name:12} FAILED at {}: {}{cause}",
        failure.step, failure.error
    )
}

/// One bot's cycle with its own shell, API client and venue connection.
fn update_bot(
    config: &Config,
    bot: &BotConfig,
    alerts: &dyn AlertSink,
    audit: &AuditLog,
) -> std::result::Result<CycleOutcome, CycleFailure> {
    let setup = || -> Result<_> {
        let api = BotApi::for_bot(bot)?;
        let configs = HttpConfigSource::new()?;
        let venue = if bot.full_reset {
            Some(connect_venue(&config.liquidation, bot)?)
        } else {
            None
        };
        Ok((api, configs, venue))
    };

    let (api, configs, venue) = match cycle::at(Step::Setup, setup()) {
        Ok(parts) => parts,
        Err(failure) => {
            cycle::report_failure(alerts, Some(audit), &bot.name, &failure);
            return Err(failure);
        }
    };

    let shell = OpenSsh::for_bot(bot);
    BotSession {
        bot,
        liquidation: &config.liquidation,
        retry: &config.retry,
        shell: &shell,
        api: &api,
        venue: venue.as_deref(),
        configs: &configs,
        alerts,
        audit: Some(audit),
    }
    .update()
}

/// Sell every non-reserved asset of one bot's account.
pub fn run_liquidate(config: &Config, bot_name: &str, opts: &LiquidateOptions) -> Result<()> {
    let bot = config.bot(bot_name)?;
    let settings = &config.liquidation;
    let venue = connect_venue(settings, bot)?;

    let snapshot = venue.balances()?;
    let prices = venue.prices()?;
    let plan = SellPlan::build(
        &snapshot,
        &settings.reference_currency,
        settings.fee_asset.as_ref(),
        settings.max_precision,
    )?;

    if plan.is_empty() {
        println!("Nothing to sell: {bot_name} holds only reserved assets.");
        return Ok(());
    }

    display_plan(&plan, &prices, &settings.reference_currency);

    if opts.dry_run {
        println!("\n[DRY RUN] No orders submitted.");
        return Ok(());
    }

    let audit = AuditLog::open(&config.audit_path())?;

    if !opts.force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Sell {} assets on {bot_name}?", plan.len()))
            .default(false)
            .interact()
            .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;

        if !confirmed {
            println!("Aborted.");
            audit.log(
                "user_confirmed",
                serde_json::json!({"bot": bot_name, "approved": false}),
            )?;
            return Ok(());
        }

        audit.log(
            "user_confirmed",
            serde_json::json!({"bot": bot_name, "approved": true}),
        )?;
    }

    let result = liquidate::liquidate_all(
        venue.as_ref(),
        &snapshot,
        &prices,
        &settings.reference_currency,
        settings.fee_asset.as_ref(),
        settings.max_precision,
    )?;
    audit::log_liquidation(&audit, bot_name, &result);

    print!("\n{result}");
    let leftovers = result.leftovers();
    if !leftovers.is_empty() {
        let alerts = alert::from_config(config.alerts.as_ref())?;
        let assets: Vec<&str> = leftovers.iter().map(|a| a.as_str()).collect();
        alert::notify(
            alerts.as_ref(),
            bot_name,
            &format!("could not sell or convert: {}", assets.join(", ")),
        );
    }
    println!(
        "\n{} sold, {} partially filled, {} converted, {} unsold, {} skipped. Audit logged to {}",
        result.sold.len(),
        result.unfilled.len(),
        result.converted.len(),
        result.unsold.len(),
        result.skipped.len(),
        config.audit_path().display()
    );

    Ok(())
}

/// Print one bot's balances valued in the reference currency.
pub fn show_balances(config: &Config, bot_name: &str) -> Result<()> {
    let bot = config.bot(bot_name)?;
    let settings = &config.liquidation;
    let reference = &settings.reference_currency;
    let venue = connect_venue(settings, bot)?;

    let snapshot = venue.balances()?;
    let prices = venue.prices()?;
    let dust = DustSet::classify(&snapshot, &prices, reference, settings.dust_threshold);

    let positive: Vec<_> = snapshot.positive().collect();
    if positive.is_empty() {
        println!("No balances.");
        return Ok(());
    }

    println!("BALANCES ({bot_name}, valued in {reference}):");
    let mut total = rust_decimal::Decimal::ZERO;
    for (asset, free) in positive {
        let value = prices.value(asset, free, reference);
        if let Some(v) = value {
            total += v;
        }
        let note = if asset == reference {
            "reference"
        } else if Some(asset) == settings.fee_asset.as_ref() {
            "fee asset"
        } else if dust.contains(asset) {
            "dust"
        } else if value.is_none() {
            "no price"
        } else {
            ""
        };
        println!(
            "  {:8} {:>20} {:>16}  {note}",
            asset,
            free,
            value.map(|v| v.round_dp(8).to_string()).unwrap_or_else(|| "-".into()),
        );
    }
    println!("\nTotal: {} {reference} ({} dust)", total.round_dp(8), dust.len());
    Ok(())
}

/// Ping every bot's API once.
pub fn check_status(config: &Config) -> Result<()> {
    let mut down = 0;
    for bot in &config.bots {
        print!("{:12} {}... ", bot.name, bot.api_base());
        match BotApi::for_bot(bot).and_then(|api| api.ping()) {
            Ok(()) => println!("OK"),
            Err(e) => {
                println!("DOWN ({e})");
                warn!("{} did not answer ping: {e}", bot.name);
                down += 1;
            }
        }
    }

    if down > 0 {
        return Err(Error::BotsFailed {
            failed: down,
            total: config.bots.len(),
        });
    }
    Ok(())
}

/// Append a `bot_report` event for every bot.
pub fn run_report(config: &Config) -> Result<()> {
    let audit = AuditLog::open(&config.audit_path())?;
    let date = Utc::now().date_naive();
    let mut failed = 0;

    println!("REPORT {date}:");
    for bot in &config.bots {
        let result = BotApi::for_bot(bot)
            .and_then(|api| report::report_bot(&audit, &bot.name, &api, date));
        match result {
            Ok(row) => println!("{row}"),
            Err(e) => {
                println!("  {:12} FAILED ({e})", bot.name);
                error!("Report for {} failed: {e}", bot.name);
                failed += 1;
            }
        }
    }
    info!("Report written to {}", config.audit_path().display());

    if failed > 0 {
        return Err(Error::BotsFailed {
            failed,
            total: config.bots.len(),
        });
    }
    Ok(())
}

fn display_plan(plan: &SellPlan, prices: &PriceTable, reference: &Asset) {
    println!("\nSELL PLAN (into {reference}):");
    println!(
        "  {:>3}  {:8} {:>20} {:>16}",
        "#", "Asset", "Quantity", "Est. value"
    );

    for (i, intent) in plan.intents().iter().enumerate() {
        let value = prices
            .pair_price(&intent.asset, reference)
            .map(|p| (p * intent.truncated()).round_dp(8).to_string())
            .unwrap_or_else(|| "no market".into());
        println!(
            "  {:>3}  {:8} {:>20} {:>16}",
            i + 1,
            intent.asset,
            intent.truncated(),
            value,
        );
    }
}
