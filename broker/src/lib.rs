//! Trading-venue capability trait and implementations for freqkeeper.
//!
//! Provides a generic `Venue` trait covering exactly what account
//! maintenance needs from an exchange. Implementations:
//!
//! - **Binance** (feature `binance`): Binance spot REST API
//! - **Mock**: scripted responses for tests

pub mod error;
pub mod mock;
pub mod types;

#[cfg(feature = "binance")]
pub mod binance;

pub use error::BrokerError;
pub use types::*;

use freqkeeper::{Asset, BalanceSnapshot, PriceTable};

/// A connection to a trading venue.
///
/// Chosen once at construction; nothing downstream branches on which venue
/// it is talking to.
pub trait Venue {
    /// Free balance of every asset in the account.
    fn balances(&self) -> Result<BalanceSnapshot, BrokerError>;

    /// Last traded price of every pair the venue lists.
    fn prices(&self) -> Result<PriceTable, BrokerError>;

    /// Submit a market sell.
    ///
    /// Lot-size rejections must surface as [`BrokerError::BelowMinimum`].
    fn market_sell(&self, order: &MarketSell) -> Result<Fill, BrokerError>;

    /// Convert small balances of `assets` in one batched call.
    fn convert_dust(&self, assets: &[Asset]) -> Result<DustConversion, BrokerError>;

    /// All orders currently resting on the venue.
    fn open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError>;

    /// Cancel a resting order.
    fn cancel_order(&self, order: &OpenOrder) -> Result<(), BrokerError>;
}
