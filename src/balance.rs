//! Point-in-time account balances and market prices.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use crate::asset::Asset;
use crate::error::ValidationError;

/// Free (available) quantity per asset, captured at one point in time.
///
/// Never persisted; fetched fresh each cycle. Iteration is ordered by asset
/// so everything derived from a snapshot is deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BalanceSnapshot {
    free: BTreeMap<Asset, Decimal>,
}

impl BalanceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `(asset, free)` pairs. Later duplicates win.
    pub fn from_free<I>(balances: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (Asset, Decimal)>,
    {
        let mut snapshot = Self::new();
        for (asset, quantity) in balances {
            snapshot.insert(asset, quantity)?;
        }
        Ok(snapshot)
    }

    /// Set the free quantity of an asset. Rejects negative quantities.
    pub fn insert(&mut self, asset: Asset, quantity: Decimal) -> Result<(), ValidationError> {
        if quantity.is_sign_negative() && !quantity.is_zero() {
            return Err(ValidationError::NegativeQuantity {
                asset: asset.to_string(),
                quantity,
            });
        }
        self.free.insert(asset, quantity);
        Ok(())
    }

    pub fn get(&self, asset: &Asset) -> Option<Decimal> {
        self.free.get(asset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Asset, Decimal)> {
        self.free.iter().map(|(a, q)| (a, *q))
    }

    /// Assets holding a strictly positive free quantity.
    pub fn positive(&self) -> impl Iterator<Item = (&Asset, Decimal)> {
        self.iter().filter(|(_, q)| *q > Decimal::ZERO)
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

/// Last traded price per trading pair (`ETHBTC` → price of 1 ETH in BTC).
///
/// Must be captured in the same cycle as the [`BalanceSnapshot`] it is used
/// with; prices are never cached across cycles.
#[derive(Clone, Debug, Default)]
pub struct PriceTable {
    prices: FxHashMap<String, Decimal>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price of a pair. Zero or negative prices are rejected since
    /// they would make every valuation meaningless.
    pub fn insert(&mut self, pair: &str, price: Decimal) -> Result<(), ValidationError> {
        if price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice {
                pair: pair.to_string(),
                price,
            });
        }
        self.prices.insert(pair.to_ascii_uppercase(), price);
        Ok(())
    }

    /// Price of a pair symbol as the venue names it.
    pub fn get(&self, pair: &str) -> Option<Decimal> {
        self.prices.get(pair).copied()
    }

    /// Price of `base` quoted in `quote`, direct pair only.
    ///
    /// This is the lookup used for selling: a market sell of `base` needs the
    /// `{base}{quote}` market to exist.
    pub fn pair_price(&self, base: &Asset, quote: &Asset) -> Option<Decimal> {
        self.get(&base.pair(quote))
    }

    /// Value of one unit of `asset` in `reference`, for reporting.
    ///
    /// Tries the direct pair first, then the inverted `{reference}{asset}`
    /// pair. The reference asset itself is worth exactly one.
    pub fn unit_value(&self, asset: &Asset, reference: &Asset) -> Option<Decimal> {
        if asset == reference {
            return Some(Decimal::ONE);
        }
        self.pair_price(asset, reference).or_else(|| {
            self.pair_price(reference, asset)
                .and_then(|inverse| Decimal::ONE.checked_div(inverse))
        })
    }

    /// Value of `quantity` units of `asset` in `reference`.
    pub fn value(&self, asset: &Asset, quantity: Decimal, reference: &Asset) -> Option<Decimal> {
        self.unit_value(asset, reference)
            .and_then(|unit| quantity.checked_mul(unit))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
