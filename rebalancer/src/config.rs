//! TOML configuration loading and validation.
//!
//! Everything a bot needs (credentials included) is read here, once, and
//! handed down explicitly. Nothing below this module looks at the
//! environment.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use freqkeeper::{Asset, MAX_PRECISION};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::retry::PollPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub alerts: Option<AlertsConfig>,
    pub liquidation: LiquidationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub bots: Vec<BotConfig>,
}

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Where operator alerts go. Absent means alerts are only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    pub telegram_token: Secret,
    pub telegram_chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquidationConfig {
    #[serde(default = "default_venue")]
    pub venue: String,
    #[serde(default)]
    pub testnet: bool,
    pub reference_currency: Asset,
    /// Asset kept back to pay trading fees. Omit to liquidate it as well.
    #[serde(default)]
    pub fee_asset: Option<Asset>,
    #[serde(default = "default_max_precision")]
    pub max_precision: u32,
    /// Value in the reference currency at or below which a balance is
    /// reported as dust.
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: Decimal,
}

fn default_venue() -> String {
    "binance".into()
}
fn default_max_precision() -> u32 {
    4
}
fn default_dust_threshold() -> Decimal {
    Decimal::new(1, 3)
}

/// Attempt counts and fixed intervals for the bounded retry loops.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_ssh_attempts")]
    pub ssh_attempts: u32,
    #[serde(default = "default_ssh_interval")]
    pub ssh_interval_secs: u64,
    #[serde(default = "default_ping_attempts")]
    pub ping_attempts: u32,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_stop_attempts")]
    pub stop_attempts: u32,
    #[serde(default = "default_stop_interval")]
    pub stop_interval_secs: u64,
}

fn default_ssh_attempts() -> u32 {
    5
}
fn default_ssh_interval() -> u64 {
    3
}
fn default_ping_attempts() -> u32 {
    10
}
fn default_ping_interval() -> u64 {
    1
}
fn default_stop_attempts() -> u32 {
    5
}
fn default_stop_interval() -> u64 {
    5
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            ssh_attempts: default_ssh_attempts(),
            ssh_interval_secs: default_ssh_interval(),
            ping_attempts: default_ping_attempts(),
            ping_interval_secs: default_ping_interval(),
            stop_attempts: default_stop_attempts(),
            stop_interval_secs: default_stop_interval(),
        }
    }
}

impl RetryConfig {
    pub fn ssh_policy(&self) -> PollPolicy {
        PollPolicy::new(self.ssh_attempts, Duration::from_secs(self.ssh_interval_secs))
    }

    pub fn ping_policy(&self) -> PollPolicy {
        PollPolicy::new(self.ping_attempts, Duration::from_secs(self.ping_interval_secs))
    }

    pub fn stop_policy(&self) -> PollPolicy {
        PollPolicy::new(self.stop_attempts, Duration::from_secs(self.stop_interval_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

/// One bot: its machine, its freqtrade files and its credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub name: String,
    pub host: String,
    pub user: String,
    pub private_key: PathBuf,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default)]
    pub full_reset: bool,
    #[serde(default = "default_initial_state")]
    pub initial_state: String,
    pub config_url: String,
    pub strategy_url: String,
    pub exchange_key: String,
    pub exchange_secret: Secret,
    pub telegram_token: Secret,
    pub telegram_chat_id: String,
    pub api_username: String,
    pub api_password: Secret,
}

fn default_api_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}
fn default_initial_state() -> String {
    "running".into()
}

/// Last path segment of a URL.
fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

impl BotConfig {
    /// File name the freqtrade config is installed under.
    pub fn config_file(&self) -> &str {
        file_name(&self.config_url)
    }

    /// File name the strategy is installed under.
    pub fn strategy_file(&self) -> &str {
        file_name(&self.strategy_url)
    }

    /// Strategy class name freqtrade is started with.
    pub fn strategy_class(&self) -> &str {
        let file = self.strategy_file();
        file.strip_suffix(".py").unwrap_or(file)
    }

    /// Trade database freqtrade writes for this run mode.
    pub fn database_file(&self) -> &'static str {
        if self.dry_run {
            "tradesv3.dryrun.sqlite"
        } else {
            "tradesv3.sqlite"
        }
    }

    /// Base URL of the bot's REST API.
    pub fn api_base(&self) -> String {
        format!("http://{}:{}/api/v1", self.host, self.api_port)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("bot name must not be empty".into()));
        }
        if self.host.is_empty() {
            return Err(Error::Config(format!("{}: host must not be empty", self.name)));
        }
        if self.api_port == 0 {
            return Err(Error::Config(format!("{}: api_port must be > 0", self.name)));
        }
        if self.config_file().is_empty() || !self.config_file().ends_with(".json") {
            return Err(Error::Config(format!(
                "{}: config_url must end in a .json file name",
                self.name
            )));
        }
        if self.strategy_file().is_empty() || !self.strategy_file().ends_with(".py") {
            return Err(Error::Config(format!(
                "{}: strategy_url must end in a .py file name",
                self.name
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.liquidation.venue != "binance" {
            return Err(Error::Config(format!(
                "unknown venue {:?} (supported: binance)",
                self.liquidation.venue
            )));
        }
        if self.liquidation.max_precision > MAX_PRECISION {
            return Err(Error::Config(format!(
                "max_precision must be <= {MAX_PRECISION}"
            )));
        }
        if self.liquidation.dust_threshold.is_sign_negative() {
            return Err(Error::Config("dust_threshold must be >= 0".into()));
        }
        if self.liquidation.fee_asset.as_ref() == Some(&self.liquidation.reference_currency) {
            return Err(Error::Config(
                "fee_asset must differ from reference_currency".into(),
            ));
        }
        let retry = &self.retry;
        if retry.ssh_attempts == 0 || retry.ping_attempts == 0 || retry.stop_attempts == 0 {
            return Err(Error::Config("retry attempt counts must be > 0".into()));
        }
        if self.bots.is_empty() {
            return Err(Error::Config("at least one [[bots]] entry is required".into()));
        }

        let mut seen = HashSet::new();
        for bot in &self.bots {
            bot.validate()?;
            if !seen.insert(bot.name.as_str()) {
                return Err(Error::Config(format!("duplicate bot name: {}", bot.name)));
            }
        }
        Ok(())
    }

    /// Look up a bot by name.
    pub fn bot(&self, name: &str) -> Result<&BotConfig> {
        self.bots
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| Error::UnknownBot(name.to_string()))
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}

#[cfg(test)]
pub(crate) fn example_toml() -> &'static str {
    r#"
[alerts]
telegram_token = "alert-token"
telegram_chat_id = "-100123"

[liquidation]
venue = "binance"
reference_currency = "BTC"
fee_asset = "BNB"
max_precision = 4
dust_threshold = "0.001"

[retry]
ssh_attempts = 5
ssh_interval_secs = 3

[logging]
dir = "./logs"
audit_file = "audit.jsonl"

[[bots]]
name = "bot01"
host = "10.0.0.5"
user = "ubuntu"
private_key = "/home/ops/.ssh/bot.pem"
dry_run = true
config_url = "https://example.com/configs/config_bb.json"
strategy_url = "https://example.com/strategies/BB_Strategy05.py"
exchange_key = "key"
exchange_secret = "secret"
telegram_token = "bot-token"
telegram_chat_id = "42"
api_username = "freqtrader"
api_password = "hunter2"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_example_config() {
        let config = Config::from_toml(example_toml()).unwrap();
        assert_eq!(config.liquidation.reference_currency, Asset::new("BTC"));
        assert_eq!(config.liquidation.fee_asset, Some(Asset::new("BNB")));
        assert_eq!(config.liquidation.dust_threshold, Decimal::new(1, 3));
        assert_eq!(config.retry.ping_attempts, 10); // default
        assert_eq!(config.bots[0].api_port, 8080); // default
        assert!(config.alerts.is_some());
    }

    #[test]
    fn bot_file_names() {
        let config = Config::from_toml(example_toml()).unwrap();
        let bot = &config.bots[0];
        assert_eq!(bot.config_file(), "config_bb.json");
        assert_eq!(bot.strategy_file(), "BB_Strategy05.py");
        assert_eq!(bot.strategy_class(), "BB_Strategy05");
        assert_eq!(bot.database_file(), "tradesv3.dryrun.sqlite");
        assert_eq!(bot.api_base(), "http://10.0.0.5:8080/api/v1");
    }

    #[test]
    fn secrets_are_redacted() {
        let config = Config::from_toml(example_toml()).unwrap();
        let dump = format!("{:?}", config);
        assert!(!dump.contains("hunter2"));
        assert!(!dump.contains("alert-token"));
        assert_eq!(config.bots[0].api_password.expose(), "hunter2");
    }

    #[test]
    fn fee_asset_is_optional() {
        let toml = example_toml().replace("fee_asset = \"BNB\"\n", "");
        let config = Config::from_toml(&toml).unwrap();
        assert_eq!(config.liquidation.fee_asset, None);
    }

    #[test]
    fn validate_catches_unknown_venue() {
        let toml = example_toml().replace("venue = \"binance\"", "venue = \"kraken\"");
        assert!(matches!(Config::from_toml(&toml), Err(Error::Config(_))));
    }

    #[test]
    fn validate_catches_precision() {
        let mut config = Config::from_toml(example_toml()).unwrap();
        config.liquidation.max_precision = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_duplicate_bots() {
        let mut config = Config::from_toml(example_toml()).unwrap();
        config.bots.push(config.bots[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_zero_attempts() {
        let mut config = Config::from_toml(example_toml()).unwrap();
        config.retry.ping_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_bad_strategy_url() {
        let mut config = Config::from_toml(example_toml()).unwrap();
        config.bots[0].strategy_url = "https://example.com/strategies/".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_bot_lookup() {
        let config = Config::from_toml(example_toml()).unwrap();
        assert!(config.bot("bot01").is_ok());
        assert!(matches!(config.bot("bot99"), Err(Error::UnknownBot(_))));
    }

    #[test]
    fn audit_path() {
        let config = Config::from_toml(example_toml()).unwrap();
        assert_eq!(config.audit_path(), PathBuf::from("./logs/audit.jsonl"));
    }
}
