//! Broker error types.

/// Errors that can occur during venue operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("connection error: {0}")]
    Connection(String),

    /// The venue refused an order for this asset only.
    #[error("order error: {0}")]
    Order(String),

    /// The order quantity violated the venue's lot-size or minimum-notional
    /// filter. Retrying with fewer decimal digits may succeed.
    #[error("below minimum lot size: {0}")]
    BelowMinimum(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("{0}")]
    Other(String),
}

impl BrokerError {
    /// Whether the error concerns the whole venue rather than one order.
    ///
    /// Venue-wide errors abort a liquidation; per-order errors are handled
    /// asset by asset.
    pub fn is_venue_wide(&self) -> bool {
        matches!(
            self,
            BrokerError::Connection(_) | BrokerError::Auth(_) | BrokerError::RateLimit
        )
    }
}
