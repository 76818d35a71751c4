//! # freqkeeper
//!
//! Core accounting types for keeping freqtrade bot accounts tidy: what the
//! account holds, what it is worth, and what should be sold.
//!
//! Nothing in this crate touches the network. Balances and prices are
//! fetched by a venue (see `freqkeeper-broker`), turned into a [`SellPlan`]
//! here, and executed by the rebalancer.
//!
//! ## Quick Start
//!
//! ```
//! use freqkeeper::{Asset, BalanceSnapshot, SellPlan};
//! use rust_decimal::Decimal;
//!
//! let snapshot = BalanceSnapshot::from_free([
//!     (Asset::new("BTC"), Decimal::new(5, 1)),   // 0.5
//!     (Asset::new("ETH"), Decimal::new(20, 1)),  // 2.0
//!     (Asset::new("BNB"), Decimal::new(1, 3)),   // 0.001
//! ])
//! .unwrap();
//!
//! // Sell everything into BTC, but keep BNB around to pay fees.
//! let plan = SellPlan::build(&snapshot, &Asset::new("BTC"), Some(&Asset::new("BNB")), 4).unwrap();
//!
//! assert_eq!(plan.len(), 1);
//! assert!(plan.contains(&Asset::new("ETH")));
//! ```
//!
//! ## Quantities
//!
//! Quantities and prices are [`rust_decimal::Decimal`]. Lot-size handling
//! depends on exact decimal truncation, which binary floats cannot give:
//!
//! ```
//! use freqkeeper::truncate;
//! use rust_decimal::Decimal;
//!
//! let q = Decimal::new(29, 2); // 0.29
//! assert_eq!(truncate(q, 2), q);
//! ```

mod asset;
mod balance;
mod dust;
mod error;
mod plan;

pub use asset::Asset;
pub use balance::{BalanceSnapshot, PriceTable};
pub use dust::DustSet;
pub use error::ValidationError;
pub use plan::{SellIntent, SellPlan, truncate};

/// Most decimal digits any supported venue accepts for a quantity.
pub const MAX_PRECISION: u32 = 8;
