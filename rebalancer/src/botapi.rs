//! Client for a bot's freqtrade REST API.

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::{BotConfig, Secret};
use crate::error::{Error, Result};
use crate::retry::{self, PollPolicy};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Status freqtrade returns from `stop` once the trader is no longer running.
pub const ALREADY_STOPPED: &str = "already stopped";

/// One day of closed-trade profit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyRow {
    pub date: String,
    #[serde(default)]
    pub abs_profit: f64,
    #[serde(default)]
    pub trade_count: u64,
}

/// Response of `GET daily`, newest day first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyProfit {
    pub data: Vec<DailyRow>,
    #[serde(default)]
    pub stake_currency: String,
}

impl DailyProfit {
    pub fn latest(&self) -> Option<&DailyRow> {
        self.data.first()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrencyBalance {
    pub currency: String,
    #[serde(default)]
    pub free: f64,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub est_stake: f64,
}

/// Response of `GET balance`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BalanceSummary {
    #[serde(default)]
    pub currencies: Vec<CurrencyBalance>,
    /// Total value in the stake currency.
    pub total: f64,
    #[serde(default)]
    pub stake: String,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

/// What the update cycle needs from a running bot.
pub trait BotControl {
    fn ping(&self) -> Result<()>;

    /// Ask the trader to stop. Returns freqtrade's status message.
    fn stop(&self) -> Result<String>;

    fn daily(&self) -> Result<DailyProfit>;

    fn balance(&self) -> Result<BalanceSummary>;
}

/// Blocking freqtrade API client with basic auth.
pub struct BotApi {
    client: Client,
    base_url: String,
    username: String,
    password: Secret,
}

impl BotApi {
    pub fn new(base_url: &str, username: &str, password: Secret) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::BotApi(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password,
        })
    }

    /// Client for the API server configured for `bot`.
    pub fn for_bot(bot: &BotConfig) -> Result<Self> {
        Self::new(&bot.api_base(), &bot.api_username, bot.api_password.clone())
    }

    /// The bot's running configuration, as raw JSON.
    pub fn show_config(&self) -> Result<serde_json::Value> {
        self.send(self.authed(self.client.get(self.url("show_config"))), "show_config")
    }

    fn url(&self, command: &str) -> String {
        format!("{}/{command}", self.base_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(self.password.expose()))
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        debug!("bot API request: {what}");
        let resp = request
            .send()
            .map_err(|e| Error::BotApi(format!("{what} request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::BotApi(format!("{what} returned {status}: {body}")));
        }

        resp.json::<T>()
            .map_err(|e| Error::BotApi(format!("failed to parse {what}: {e}")))
    }
}

impl BotControl for BotApi {
    fn ping(&self) -> Result<()> {
        self.send::<serde_json::Value>(self.client.get(self.url("ping")), "ping")?;
        Ok(())
    }

    fn stop(&self) -> Result<String> {
        let body: StatusBody = self.send(self.authed(self.client.post(self.url("stop"))), "stop")?;
        Ok(body.status)
    }

    fn daily(&self) -> Result<DailyProfit> {
        self.send(self.authed(self.client.get(self.url("daily"))), "daily")
    }

    fn balance(&self) -> Result<BalanceSummary> {
        self.send(self.authed(self.client.get(self.url("balance"))), "balance")
    }
}

/// Call `stop` until the bot reports it is already stopped.
///
/// Returns `false` when the bot never confirmed within the policy; the
/// caller decides whether that matters.
pub fn stop_until_stopped(bot: &dyn BotControl, name: &str, policy: &PollPolicy) -> bool {
    let stopped = retry::poll(&format!("stop {name}"), policy, |_| match bot.stop() {
        Ok(status) if status == ALREADY_STOPPED => Ok(()),
        Ok(status) => {
            debug!("{name} is {status}");
            Err(Error::BotApi(status))
        }
        Err(e) => Err(e),
    });

    match stopped {
        Some(()) => {
            info!("{name} is stopped");
            true
        }
        None => {
            warn!("{name} did not confirm it stopped");
            false
        }
    }
}

/// Ping until the API answers. Returns `false` if it never did.
pub fn wait_until_up(bot: &dyn BotControl, name: &str, policy: &PollPolicy) -> bool {
    retry::poll(&format!("ping {name}"), policy, |_| bot.ping()).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct ScriptedStops {
        replies: RefCell<Vec<Result<String>>>,
        calls: RefCell<u32>,
    }

    impl ScriptedStops {
        fn new(mut replies: Vec<Result<String>>) -> Self {
            replies.reverse();
            Self {
                replies: RefCell::new(replies),
                calls: RefCell::new(0),
            }
        }
    }

    impl BotControl for ScriptedStops {
        fn ping(&self) -> Result<()> {
            Err(Error::BotApi("connection refused".into()))
        }

        fn stop(&self) -> Result<String> {
            *self.calls.borrow_mut() += 1;
            self.replies
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Ok("stopping trader ...".into()))
        }

        fn daily(&self) -> Result<DailyProfit> {
            unimplemented!()
        }

        fn balance(&self) -> Result<BalanceSummary> {
            unimplemented!()
        }
    }

    #[test]
    fn stop_repeats_until_already_stopped() {
        let bot = ScriptedStops::new(vec![
            Ok("stopping trader ...".into()),
            Err(Error::BotApi("timeout".into())),
            Ok(ALREADY_STOPPED.into()),
        ]);
        assert!(stop_until_stopped(&bot, "bot01", &PollPolicy::immediate(5)));
        assert_eq!(*bot.calls.borrow(), 3);
    }

    #[test]
    fn stop_gives_up_after_max_attempts() {
        let bot = ScriptedStops::new(vec![]);
        assert!(!stop_until_stopped(&bot, "bot01", &PollPolicy::immediate(5)));
        assert_eq!(*bot.calls.borrow(), 5);
    }

    #[test]
    fn unreachable_api_never_comes_up() {
        let bot = ScriptedStops::new(vec![]);
        assert!(!wait_until_up(&bot, "bot01", &PollPolicy::immediate(3)));
    }

    #[test]
    fn parse_daily() {
        let json = r#"{
            "data": [
                {"date": "2024-03-02", "abs_profit": 0.0012, "fiat_value": 80.1, "trade_count": 4},
                {"date": "2024-03-01", "abs_profit": -0.0003, "fiat_value": -20.0, "trade_count": 1}
            ],
            "fiat_display_currency": "USD",
            "stake_currency": "BTC"
        }"#;
        let daily: DailyProfit = serde_json::from_str(json).unwrap();
        assert_eq!(daily.stake_currency, "BTC");
        assert_eq!(daily.latest().unwrap().date, "2024-03-02");
        assert_eq!(daily.latest().unwrap().trade_count, 4);
    }

    #[test]
    fn parse_balance() {
        let json = r#"{
            "currencies": [
                {"currency": "BTC", "free": 0.4, "balance": 0.5, "used": 0.1, "est_stake": 0.5},
                {"currency": "ETH", "free": 2.0, "balance": 2.0, "used": 0.0, "est_stake": 0.1}
            ],
            "total": 0.6,
            "symbol": "USD",
            "value": 40000.0,
            "stake": "BTC"
        }"#;
        let balance: BalanceSummary = serde_json::from_str(json).unwrap();
        assert_eq!(balance.currencies.len(), 2);
        assert!((balance.total - 0.6).abs() < 1e-12);
    }
}
