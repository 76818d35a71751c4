//! Sell plans: which assets to liquidate, and at what precision.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::MAX_PRECISION;
use crate::asset::Asset;
use crate::balance::BalanceSnapshot;
use crate::error::ValidationError;

/// Truncate `quantity` to `digits` decimal places. Never rounds up.
///
/// ```
/// use freqkeeper::truncate;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let q = Decimal::from_str("1.23456789").unwrap();
/// assert_eq!(truncate(q, 4).to_string(), "1.2345");
/// ```
pub fn truncate(quantity: Decimal, digits: u32) -> Decimal {
    quantity.round_dp_with_strategy(digits, RoundingStrategy::ToZero)
}

/// Intent to sell one asset into the reference currency.
///
/// `quantity` is the untruncated free balance; each attempt truncates it
/// afresh at the current `precision`, so stepping down never compounds
/// truncation loss.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SellIntent {
    pub asset: Asset,
    pub quantity: Decimal,
    pub precision: u32,
}

impl SellIntent {
    /// Quantity to submit at the current precision.
    pub fn truncated(&self) -> Decimal {
        truncate(self.quantity, self.precision)
    }

    /// Drop one decimal digit of precision.
    ///
    /// Returns `false` (and leaves the intent unchanged) once precision is 0.
    pub fn step_down(&mut self) -> bool {
        if self.precision == 0 {
            return false;
        }
        self.precision -= 1;
        true
    }
}

/// Ordered list of sell intents derived from a [`BalanceSnapshot`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SellPlan {
    intents: Vec<SellIntent>,
}

impl SellPlan {
    /// Plan the liquidation of every positive balance except the reference
    /// currency and the fee asset, starting each at `max_precision`.
    pub fn build(
        snapshot: &BalanceSnapshot,
        reference: &Asset,
        fee_asset: Option<&Asset>,
        max_precision: u32,
    ) -> Result<Self, ValidationError> {
        if max_precision > MAX_PRECISION {
            return Err(ValidationError::PrecisionTooLarge(max_precision));
        }

        let intents = snapshot
            .positive()
            .filter(|(asset, _)| *asset != reference && Some(*asset) != fee_asset)
            .map(|(asset, quantity)| SellIntent {
                asset: asset.clone(),
                quantity,
                precision: max_precision,
            })
            .collect();

        Ok(Self { intents })
    }

    pub fn intents(&self) -> &[SellIntent] {
        &self.intents
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.intents.iter().map(|i| &i.asset)
    }

    pub fn contains(&self, asset: &Asset) -> bool {
        self.intents.iter().any(|i| &i.asset == asset)
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

impl IntoIterator for SellPlan {
    type Item = SellIntent;
    type IntoIter = std::vec::IntoIter<SellIntent>;

    fn into_iter(self) -> Self::IntoIter {
        self.intents.into_iter()
    }
}
