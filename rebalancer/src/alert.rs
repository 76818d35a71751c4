//! Operator alerts.

use std::time::Duration;

use log::{debug, error};
use reqwest::blocking::Client;

use crate::config::{AlertsConfig, Secret};
use crate::error::{Error, Result};

const TELEGRAM_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Somewhere to send failures a human should look at.
///
/// Shared by every bot thread.
pub trait AlertSink: Sync {
    fn report(&self, bot: &str, message: &str) -> Result<()>;
}

/// Text of an alert about `bot`.
pub fn format_alert(bot: &str, message: &str) -> String {
    format!("{bot} Error:\n{message}")
}

/// Report and swallow delivery failures: alerts never abort a cycle.
pub fn notify(sink: &dyn AlertSink, bot: &str, message: &str) {
    if let Err(e) = sink.report(bot, message) {
        error!("Could not deliver alert for {bot}: {e}");
    }
}

/// Alerts through a Telegram bot.
pub struct Telegram {
    client: Client,
    token: Secret,
    chat_id: String,
    base_url: String,
}

impl Telegram {
    pub fn new(token: Secret, chat_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Alert(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            chat_id: chat_id.to_string(),
            base_url: TELEGRAM_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl AlertSink for Telegram {
    fn report(&self, bot: &str, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token.expose());
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": format_alert(bot, message),
        });

        debug!("Sending Telegram alert for {bot}");
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| Error::Alert(format!("telegram request failed: {}", e.without_url())))?;

        if !resp.status().is_success() {
            return Err(Error::Alert(format!("telegram returned {}", resp.status())));
        }
        Ok(())
    }
}

/// Alerts that only go to the log.
#[derive(Debug, Default)]
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn report(&self, bot: &str, message: &str) -> Result<()> {
        error!("{}", format_alert(bot, message));
        Ok(())
    }
}

/// The sink configured in `[alerts]`, or [`LogAlerts`] when absent.
pub fn from_config(alerts: Option<&AlertsConfig>) -> Result<Box<dyn AlertSink>> {
    match alerts {
        Some(a) => Ok(Box::new(Telegram::new(
            a.telegram_token.clone(),
            &a.telegram_chat_id,
        )?)),
        None => Ok(Box::new(LogAlerts)),
    }
}
