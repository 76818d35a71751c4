//! Dust: balances too small to sell on their own.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::asset::Asset;
use crate::balance::{BalanceSnapshot, PriceTable};

/// Ordered set of assets considered dust.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DustSet {
    assets: BTreeSet<Asset>,
}

impl DustSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assets whose value in `reference` is positive but at most `threshold`.
    ///
    /// Assets with no price against the reference (in either direction) are
    /// left out: without a price they cannot be judged. The reference asset
    /// itself is never dust.
    pub fn classify(
        snapshot: &BalanceSnapshot,
        prices: &PriceTable,
        reference: &Asset,
        threshold: Decimal,
    ) -> Self {
        let assets = snapshot
            .positive()
            .filter(|(asset, _)| *asset != reference)
            .filter(|(asset, quantity)| {
                prices
                    .value(asset, *quantity, reference)
                    .is_some_and(|value| value > Decimal::ZERO && value <= threshold)
            })
            .map(|(asset, _)| asset.clone())
            .collect();
        Self { assets }
    }

    /// Returns `true` if the asset was not already present.
    pub fn insert(&mut self, asset: Asset) -> bool {
        self.assets.insert(asset)
    }

    pub fn contains(&self, asset: &Asset) -> bool {
        self.assets.contains(asset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    /// The dust batch to hand to the venue, without `excluded`.
    pub fn batch_without(&self, excluded: Option<&Asset>) -> Vec<Asset> {
        self.assets
            .iter()
            .filter(|a| Some(*a) != excluded)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl FromIterator<Asset> for DustSet {
    fn from_iter<I: IntoIterator<Item = Asset>>(iter: I) -> Self {
        Self {
            assets: iter.into_iter().collect(),
        }
    }
}
