//! Error types for the rebalancer.

use std::path::PathBuf;

use freqkeeper_broker::BrokerError;

/// All errors that can occur during rebalancer operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("venue error: {0}")]
    Venue(#[from] BrokerError),

    #[error("invalid account data: {0}")]
    Validation(#[from] freqkeeper::ValidationError),

    #[error("bot API error: {0}")]
    BotApi(String),

    #[error("remote shell error: {0}")]
    Shell(String),

    #[error("{0} is unreachable")]
    Unreachable(String),

    #[error("alert delivery failed: {0}")]
    Alert(String),

    #[error("bot config template error: {0}")]
    Template(String),

    #[error("{failed} of {total} bots failed")]
    BotsFailed { failed: usize, total: usize },

    #[error("unknown bot: {0}")]
    UnknownBot(String),

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
