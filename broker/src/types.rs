//! Shared venue types: orders, fills, dust conversions.

use freqkeeper::Asset;
use rust_decimal::Decimal;

/// Market sell of `quantity` units of `base`, received in `quote`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSell {
    pub base: Asset,
    pub quote: Asset,
    pub quantity: Decimal,
}

impl MarketSell {
    /// Venue pair symbol, e.g. `ETHBTC`.
    pub fn pair(&self) -> String {
        self.base.pair(&self.quote)
    }
}

/// Result of an accepted market order.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: u64,
    pub pair: String,
    pub status: OrderState,
    /// Base quantity actually executed.
    pub executed_qty: Decimal,
    /// Quote quantity received.
    pub quote_qty: Decimal,
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderState {
    /// Parse a venue status string (`FILLED`, `PARTIALLY_FILLED`, ...).
    pub fn from_venue(status: &str) -> Self {
        match status {
            "NEW" | "PENDING_NEW" => OrderState::New,
            "PARTIALLY_FILLED" => OrderState::PartiallyFilled,
            "FILLED" => OrderState::Filled,
            "CANCELED" | "CANCELLED" | "PENDING_CANCEL" => OrderState::Cancelled,
            "REJECTED" => OrderState::Rejected,
            _ => OrderState::Expired,
        }
    }
}

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// An order resting on the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOrder {
    pub order_id: u64,
    pub pair: String,
    pub client_order_id: String,
    pub side: Side,
}

/// Outcome of a batched dust conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DustConversion {
    /// Assets the venue actually converted.
    pub converted: Vec<Asset>,
    /// Total received, in the venue's dust asset (BNB on Binance).
    pub total_received: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_symbol() {
        let sell = MarketSell {
            base: Asset::new("ETH"),
            quote: Asset::new("BTC"),
            quantity: Decimal::ONE,
        };
        assert_eq!(sell.pair(), "ETHBTC");
    }

    #[test]
    fn order_state_parsing() {
        assert_eq!(OrderState::from_venue("FILLED"), OrderState::Filled);
        assert_eq!(
            OrderState::from_venue("PARTIALLY_FILLED"),
            OrderState::PartiallyFilled
        );
        assert_eq!(OrderState::from_venue("CANCELED"), OrderState::Cancelled);
        assert_eq!(OrderState::from_venue("EXPIRED_IN_MATCH"), OrderState::Expired);
    }
}
