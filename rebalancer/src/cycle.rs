//! Per-bot update cycle.
//!
//! Stops a bot, optionally wipes its account and trade history, reboots
//! its machine, installs fresh config and strategy files, and starts it
//! again. Every step is sequential; the first failure ends the cycle for
//! that bot and is reported to the alert channel.

use std::fmt;
use std::thread;
use std::time::Duration;

use freqkeeper_broker::{BrokerError, Venue};
use log::{debug, error, info, warn};
use reqwest::blocking::Client;

use crate::alert::{self, AlertSink};
use crate::audit::{self, AuditLog};
use crate::botapi::{self, BotControl};
use crate::config::{BotConfig, LiquidationConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::liquidate::{self, Liquidation};
use crate::retry;
use crate::shell::{self, RemoteShell};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote directory freqtrade is installed in.
pub const FREQTRADE_DIR: &str = "~/freqtrade";

/// Steps of the update cycle, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Building clients and connecting to the venue.
    Setup,
    CheckConnection,
    CancelOrders,
    Liquidate,
    RemoveDatabase,
    Reconnect,
    InstallConfig,
    InstallStrategy,
    StartBot,
    PingBot,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Setup => "setup",
            Step::CheckConnection => "check_connection",
            Step::CancelOrders => "cancel_orders",
            Step::Liquidate => "liquidate",
            Step::RemoveDatabase => "remove_database",
            Step::Reconnect => "reconnect",
            Step::InstallConfig => "install_config",
            Step::InstallStrategy => "install_strategy",
            Step::StartBot => "start_bot",
            Step::PingBot => "ping_bot",
        };
        f.write_str(name)
    }
}

/// The step a cycle stopped at, and why.
#[derive(Debug)]
pub struct CycleFailure {
    pub step: Step,
    pub error: Error,
}

impl fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.error)
    }
}

/// What a successful cycle did.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    /// Whether the bot confirmed it stopped before the reboot.
    pub stopped_cleanly: bool,
    /// Present when the cycle ran a full reset.
    pub liquidation: Option<Liquidation>,
    pub cancelled_orders: usize,
}

/// Where freqtrade config templates come from.
pub trait ConfigSource {
    fn fetch(&self, url: &str) -> Result<serde_json::Value>;
}

/// Fetches templates over HTTP(S).
pub struct HttpConfigSource {
    client: Client,
}

impl HttpConfigSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Template(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl ConfigSource for HttpConfigSource {
    fn fetch(&self, url: &str) -> Result<serde_json::Value> {
        debug!("Fetching config template {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Template(format!("fetching {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Template(format!("{url} returned {status}")));
        }
        resp.json()
            .map_err(|e| Error::Template(format!("{url} is not valid JSON: {e}")))
    }
}

/// Fill the bot's own settings and credentials into a config template.
///
/// Everything else in the template is kept as is.
pub fn render_config(mut template: serde_json::Value, bot: &BotConfig) -> Result<serde_json::Value> {
    use serde_json::Value;

    let root = template
        .as_object_mut()
        .ok_or_else(|| Error::Template("config template must be a JSON object".into()))?;

    root.insert("dry_run".into(), Value::Bool(bot.dry_run));
    root.insert("initial_state".into(), Value::String(bot.initial_state.clone()));

    let sections = [
        ("exchange", [("key", bot.exchange_key.as_str()), ("secret", bot.exchange_secret.expose())]),
        ("telegram", [("chat_id", bot.telegram_chat_id.as_str()), ("token", bot.telegram_token.expose())]),
        ("api_server", [("username", bot.api_username.as_str()), ("password", bot.api_password.expose())]),
    ];
    for (section, fields) in sections {
        let entry = root
            .entry(section)
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        let object = entry
            .as_object_mut()
            .ok_or_else(|| Error::Template(format!("\"{section}\" must be a JSON object")))?;
        for (key, value) in fields {
            object.insert(key.into(), Value::String(value.to_string()));
        }
    }

    Ok(template)
}

/// Shell script writing `config` to the bot's config file.
pub fn install_config_script(bot: &BotConfig, config: &serde_json::Value) -> Result<String> {
    let json = serde_json::to_string_pretty(config)?;
    Ok(format!(
        "mkdir -p {FREQTRADE_DIR}\ncat > {FREQTRADE_DIR}/{file} <<'{tag}'\n{json}\n{tag}\n",
        file = bot.config_file(),
        tag = shell::HEREDOC_TAG,
    ))
}

/// Shell script downloading the strategy file.
pub fn install_strategy_script(bot: &BotConfig) -> String {
    format!(
        "mkdir -p {FREQTRADE_DIR}/user_data/strategies\n\
         cd {FREQTRADE_DIR}/user_data/strategies\n\
         wget -q {} -O {}\n",
        quote(&bot.strategy_url),
        quote(bot.strategy_file()),
    )
}

/// Shell script starting freqtrade in trade mode.
pub fn start_script(bot: &BotConfig) -> String {
    format!(
        "cd {FREQTRADE_DIR}\nsource .env/bin/activate\nfreqtrade trade -c {} -s {}",
        quote(bot.config_file()),
        quote(bot.strategy_class()),
    )
}

/// Single-quote `s` for a POSIX shell.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Everything one bot's cycle runs against.
///
/// Each bot gets its own session; nothing in it is shared with other bots
/// except the alert sink and the audit log.
pub struct BotSession<'a> {
    pub bot: &'a BotConfig,
    pub liquidation: &'a LiquidationConfig,
    pub retry: &'a RetryConfig,
    pub shell: &'a dyn RemoteShell,
    pub api: &'a dyn BotControl,
    /// Required only for full resets.
    pub venue: Option<&'a dyn Venue>,
    pub configs: &'a dyn ConfigSource,
    pub alerts: &'a dyn AlertSink,
    pub audit: Option<&'a AuditLog>,
}

/// Log, alert and audit a failed cycle.
pub fn report_failure(alerts: &dyn AlertSink, audit: Option<&AuditLog>, bot: &str, failure: &CycleFailure) {
    error!("{bot}: {failure}");
    alert::notify(alerts, bot, &failure.to_string());
    if let Some(audit) = audit {
        audit::log_cycle_failed(audit, bot, &failure.step.to_string(), &failure.error.to_string());
    }
}

/// Attach the step to a failed result.
pub fn at<T>(step: Step, result: Result<T>) -> std::result::Result<T, CycleFailure> {
    result.map_err(|error| CycleFailure { step, error })
}

impl BotSession<'_> {
    /// Run the cycle and report the outcome to the audit trail and, on
    /// failure, to the alert channel.
    pub fn update(&self) -> std::result::Result<CycleOutcome, CycleFailure> {
        let name = &self.bot.name;
        info!("Updating {name} ({})", self.bot.host);
        if let Some(audit) = self.audit {
            audit::log_cycle_started(audit, name, self.bot.full_reset, self.bot.dry_run);
        }

        match self.run() {
            Ok(outcome) => {
                info!("{name} updated and running");
                if let Some(audit) = self.audit {
                    audit::log_cycle_completed(audit, name);
                }
                Ok(outcome)
            }
            Err(failure) => {
                report_failure(self.alerts, self.audit, name, &failure);
                Err(failure)
            }
        }
    }

    fn run(&self) -> std::result::Result<CycleOutcome, CycleFailure> {
        let mut outcome = CycleOutcome::default();

        at(Step::CheckConnection, self.check_connection())?;

        outcome.stopped_cleanly =
            botapi::stop_until_stopped(self.api, &self.bot.name, &self.retry.stop_policy());

        if self.bot.full_reset {
            let venue = at(
                Step::CancelOrders,
                self.venue
                    .ok_or_else(|| Error::Config("full reset requires a venue connection".into())),
            )?;
            outcome.cancelled_orders = at(Step::CancelOrders, self.cancel_all_orders(venue))?;
            outcome.liquidation = Some(at(Step::Liquidate, self.liquidate(venue))?);
            at(Step::RemoveDatabase, self.remove_database())?;
        }

        self.reboot();
        at(Step::Reconnect, self.check_connection())?;

        at(Step::InstallConfig, self.install_config())?;
        at(
            Step::InstallStrategy,
            self.shell.exec(&install_strategy_script(self.bot)).map(|_| ()),
        )?;
        info!("Starting {}", self.bot.name);
        at(Step::StartBot, self.shell.spawn_detached(&start_script(self.bot)))?;

        if !botapi::wait_until_up(self.api, &self.bot.name, &self.retry.ping_policy()) {
            return Err(CycleFailure {
                step: Step::PingBot,
                error: Error::Unreachable(format!("{} API at {}", self.bot.name, self.bot.api_base())),
            });
        }

        Ok(outcome)
    }

    fn check_connection(&self) -> Result<()> {
        retry::poll(
            &format!("connect to {}", self.bot.name),
            &self.retry.ssh_policy(),
            |_| self.shell.exec("echo connected"),
        )
        .map(|_| ())
        .ok_or_else(|| Error::Unreachable(format!("{} ({})", self.bot.name, self.bot.host)))
    }

    fn cancel_all_orders(&self, venue: &dyn Venue) -> Result<usize> {
        let orders = venue.open_orders()?;
        let mut cancelled = 0;
        for order in &orders {
            match venue.cancel_order(order) {
                Ok(()) => cancelled += 1,
                Err(e) if e.is_venue_wide() => return Err(e.into()),
                Err(e) => warn!("{}: could not cancel order {} on {}: {e}", self.bot.name, order.order_id, order.pair),
            }
        }
        info!("{}: cancelled {cancelled}/{} open orders", self.bot.name, orders.len());
        Ok(cancelled)
    }

    fn liquidate(&self, venue: &dyn Venue) -> Result<Liquidation> {
        let snapshot = venue.balances()?;
        let prices = venue.prices()?;
        let result = liquidate::liquidate_all(
            venue,
            &snapshot,
            &prices,
            &self.liquidation.reference_currency,
            self.liquidation.fee_asset.as_ref(),
            self.liquidation.max_precision,
        )?;

        if let Some(audit) = self.audit {
            audit::log_liquidation(audit, &self.bot.name, &result);
        }
        let leftovers = result.leftovers();
        if !leftovers.is_empty() {
            let assets: Vec<&str> = leftovers.iter().map(|a| a.as_str()).collect();
            alert::notify(
                self.alerts,
                &self.bot.name,
                &format!("could not sell or convert: {}", assets.join(", ")),
            );
        }
        if !result.skipped.is_empty() {
            let assets: Vec<&str> = result.skipped.iter().map(|a| a.as_str()).collect();
            alert::notify(
                self.alerts,
                &self.bot.name,
                &format!(
                    "no {} market for: {}",
                    self.liquidation.reference_currency,
                    assets.join(", ")
                ),
            );
        }
        Ok(result)
    }

    fn remove_database(&self) -> Result<()> {
        info!("{}: removing {}", self.bot.name, self.bot.database_file());
        self.shell
            .exec(&format!("rm -f {FREQTRADE_DIR}/{}", self.bot.database_file()))
            .map(|_| ())
    }

    /// The session drops as the machine goes down, so an error here is
    /// expected and only logged.
    fn reboot(&self) {
        info!("Rebooting {}", self.bot.name);
        if let Err(e) = self.shell.exec("sudo reboot") {
            debug!("{}: reboot closed the session: {e}", self.bot.name);
        }
        let grace = self.retry.ssh_policy().interval;
        if !grace.is_zero() {
            thread::sleep(grace);
        }
    }

    fn install_config(&self) -> Result<()> {
        let template = self.configs.fetch(&self.bot.config_url)?;
        let rendered = render_config(template, self.bot)?;
        self.shell
            .exec(&install_config_script(self.bot, &rendered)?)
            .map(|_| ())
    }
}

/// True when a failure came from the venue being unavailable, not the bot.
pub fn is_venue_outage(failure: &CycleFailure) -> bool {
    matches!(&failure.error, Error::Venue(e) if BrokerError::is_venue_wide(e))
}
