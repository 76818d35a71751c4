//! Account liquidation: sell everything into the reference currency.
//!
//! Each asset is sold with a market order, starting at the configured
//! decimal precision and stepping down one digit every time the venue
//! rejects the quantity as below its lot size. Assets that cannot be sold
//! even at precision 0 become dust, and all dust is converted in a single
//! batched call at the end.
//!
//! An order the venue accepts but executes nothing of (an expired market
//! order on an empty book) counts as rejected. A partial fill is recorded
//! as sold for the executed quantity and the remainder as unfilled.

use std::collections::BTreeMap;
use std::fmt;

use freqkeeper::{Asset, BalanceSnapshot, DustSet, PriceTable, SellIntent, SellPlan};
use freqkeeper_broker::{BrokerError, Fill, MarketSell, Venue};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;

/// How one sell attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Filled,
    /// Accepted, but only this base quantity executed.
    PartiallyFilled(Decimal),
    BelowMinimum,
    Rejected(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Filled => write!(f, "FILLED"),
            AttemptOutcome::PartiallyFilled(qty) => write!(f, "PARTIAL ({qty} executed)"),
            AttemptOutcome::BelowMinimum => write!(f, "BELOW MIN"),
            AttemptOutcome::Rejected(msg) => write!(f, "REJECTED ({msg})"),
        }
    }
}

/// One market sell attempt, as submitted (or refused locally).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellAttempt {
    pub asset: Asset,
    pub quantity: Decimal,
    pub precision: u32,
    pub outcome: AttemptOutcome,
}

/// What a liquidation achieved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Liquidation {
    /// Asset → base quantity the venue reported as executed.
    pub sold: BTreeMap<Asset, Decimal>,
    /// Asset → submitted quantity a partial fill left in the account.
    pub unfilled: BTreeMap<Asset, Decimal>,
    /// Dust assets the venue converted.
    pub converted: Vec<Asset>,
    /// Assets left in the account: dust the venue did not convert.
    pub unsold: Vec<Asset>,
    /// Assets with no direct pair against the reference currency.
    pub skipped: Vec<Asset>,
    /// Every attempt in submission order.
    pub attempts: Vec<SellAttempt>,
    /// Amount received from the dust conversion, in the venue's dust asset.
    pub dust_received: Decimal,
}

impl Liquidation {
    /// True when nothing was left behind.
    pub fn is_complete(&self) -> bool {
        self.unsold.is_empty() && self.skipped.is_empty() && self.unfilled.is_empty()
    }

    /// Every asset still held after the run: unsold dust, partial fills
    /// and skipped assets.
    pub fn leftovers(&self) -> Vec<&Asset> {
        let mut assets: Vec<&Asset> = self
            .unsold
            .iter()
            .chain(self.unfilled.keys())
            .collect();
        assets.sort();
        assets.dedup();
        assets
    }

    /// Attempts made for one asset.
    pub fn attempts_for<'a>(&'a self, asset: &'a Asset) -> impl Iterator<Item = &'a SellAttempt> {
        self.attempts.iter().filter(move |a| &a.asset == asset)
    }
}

impl fmt::Display for Liquidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LIQUIDATION:")?;
        for attempt in &self.attempts {
            writeln!(
                f,
                "  {:8} {:>20} @{} digits  {}",
                attempt.asset, attempt.quantity, attempt.precision, attempt.outcome
            )?;
        }
        writeln!(f, "  sold:      {}", join(self.sold.keys()))?;
        writeln!(f, "  converted: {}", join(self.converted.iter()))?;
        writeln!(f, "  unfilled:  {}", join(self.unfilled.keys()))?;
        writeln!(f, "  unsold:    {}", join(self.unsold.iter()))?;
        writeln!(f, "  skipped:   {}", join(self.skipped.iter()))
    }
}

fn join<'a>(assets: impl Iterator<Item = &'a Asset>) -> String {
    let names: Vec<&str> = assets.map(Asset::as_str).collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

/// Sell every non-reserved balance into `reference`.
///
/// Per-asset failures never abort the run: lot-size rejections step the
/// precision down, and anything else sends the asset to dust. Venue-wide
/// failures (connection, auth, rate limit) are returned immediately.
pub fn liquidate_all(
    venue: &dyn Venue,
    snapshot: &BalanceSnapshot,
    prices: &PriceTable,
    reference: &Asset,
    fee_asset: Option<&Asset>,
    max_precision: u32,
) -> Result<Liquidation> {
    let plan = SellPlan::build(snapshot, reference, fee_asset, max_precision)?;
    info!(
        "Liquidating {} assets into {reference} (max precision {max_precision})",
        plan.len()
    );

    let mut liquidation = Liquidation::default();
    let mut dust = DustSet::new();

    for mut intent in plan {
        if prices.pair_price(&intent.asset, reference).is_none() {
            warn!(
                "No {} price, skipping {}",
                intent.asset.pair(reference),
                intent.asset
            );
            liquidation.skipped.push(intent.asset);
            continue;
        }

        match sell_stepping_down(venue, &mut intent, reference, &mut liquidation.attempts)? {
            Some(fill) => {
                let submitted = intent.truncated();
                if fill.executed_qty < submitted {
                    let remaining = submitted - fill.executed_qty;
                    warn!(
                        "Partial fill: sold {} of {submitted} {}, {remaining} left",
                        fill.executed_qty, intent.asset
                    );
                    liquidation.unfilled.insert(intent.asset.clone(), remaining);
                } else {
                    info!("Sold {} {}", fill.executed_qty, intent.asset);
                }
                liquidation.sold.insert(intent.asset, fill.executed_qty);
            }
            None => {
                dust.insert(intent.asset);
            }
        }
    }

    let batch = dust.batch_without(fee_asset);
    if !batch.is_empty() {
        convert_dust(venue, batch, &mut liquidation)?;
    }

    Ok(liquidation)
}

/// Attempt chain for one asset. `Ok(None)` means the asset is dust.
fn sell_stepping_down(
    venue: &dyn Venue,
    intent: &mut SellIntent,
    reference: &Asset,
    attempts: &mut Vec<SellAttempt>,
) -> std::result::Result<Option<Fill>, BrokerError> {
    loop {
        let quantity = intent.truncated();
        debug!(
            "Selling {quantity} {} at {} digits",
            intent.asset, intent.precision
        );

        let result = if quantity.is_zero() {
            Err(BrokerError::BelowMinimum(format!(
                "{} truncates to zero at {} digits",
                intent.quantity, intent.precision
            )))
        } else {
            venue.market_sell(&MarketSell {
                base: intent.asset.clone(),
                quote: reference.clone(),
                quantity,
            })
        };

        let mut record = |outcome| {
            attempts.push(SellAttempt {
                asset: intent.asset.clone(),
                quantity,
                precision: intent.precision,
                outcome,
            })
        };

        match result {
            Ok(fill) if fill.executed_qty.is_zero() => {
                let reason = format!(
                    "order {} {:?} with nothing executed",
                    fill.order_id, fill.status
                );
                record(AttemptOutcome::Rejected(reason.clone()));
                error!("Sell of {} not executed, treating as dust: {reason}", intent.asset);
                return Ok(None);
            }
            Ok(fill) => {
                let outcome = if fill.executed_qty < quantity {
                    AttemptOutcome::PartiallyFilled(fill.executed_qty)
                } else {
                    AttemptOutcome::Filled
                };
                record(outcome);
                return Ok(Some(fill));
            }
            Err(BrokerError::BelowMinimum(msg)) => {
                record(AttemptOutcome::BelowMinimum);
                debug!("{} below minimum at {} digits: {msg}", intent.asset, intent.precision);
                if !intent.step_down() {
                    warn!("{} below minimum at every precision, treating as dust", intent.asset);
                    return Ok(None);
                }
            }
            Err(e) if e.is_venue_wide() => return Err(e),
            Err(e) => {
                record(AttemptOutcome::Rejected(e.to_string()));
                error!("Sell of {} rejected, treating as dust: {e}", intent.asset);
                return Ok(None);
            }
        }
    }
}

/// The single dust conversion call of a liquidation.
fn convert_dust(
    venue: &dyn Venue,
    batch: Vec<Asset>,
    liquidation: &mut Liquidation,
) -> std::result::Result<(), BrokerError> {
    info!("Converting {} dust assets", batch.len());

    match venue.convert_dust(&batch) {
        Ok(conversion) => {
            liquidation.dust_received = conversion.total_received;
            for asset in batch {
                if conversion.converted.contains(&asset) {
                    liquidation.converted.push(asset);
                } else {
                    warn!("Venue did not convert dust {asset}");
                    liquidation.unsold.push(asset);
                }
            }
            Ok(())
        }
        Err(e) if e.is_venue_wide() => Err(e),
        Err(e) => {
            error!("Dust conversion failed: {e}");
            liquidation.unsold.extend(batch);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use freqkeeper_broker::mock::{DustMode, MockVenue, SellScript};
    use rust_decimal_macros::dec;

    fn btc() -> Asset {
        Asset::new("BTC")
    }

    fn run(venue: &MockVenue, fee_asset: Option<&Asset>) -> Result<Liquidation> {
        let snapshot = venue.balances().unwrap();
        let prices = venue.prices().unwrap();
        liquidate_all(venue, &snapshot, &prices, &btc(), fee_asset, 4)
    }

    #[test]
    fn truncates_before_submitting() {
        let venue = MockVenue::builder()
            .with_balance("ETH", dec!(1.23456789))
            .with_price("ETHBTC", dec!(0.05))
            .build();

        let result = run(&venue, None).unwrap();
        assert_eq!(venue.sells()[0].quantity, dec!(1.2345));
        assert_eq!(result.sold.get(&Asset::new("ETH")), Some(&dec!(1.2345)));
        assert!(result.is_complete());
    }

    #[test]
    fn steps_down_to_lot_size() {
        let venue = MockVenue::builder()
            .with_balance("ETH", dec!(1.23456789))
            .with_price("ETHBTC", dec!(0.05))
            .sell_script("ETH", SellScript::LotStep(2))
            .build();

        let result = run(&venue, None).unwrap();
        let quantities: Vec<Decimal> = venue.sells().iter().map(|s| s.quantity).collect();
        assert_eq!(quantities, vec![dec!(1.2345), dec!(1.234), dec!(1.23)]);
        assert_eq!(result.sold.get(&Asset::new("ETH")), Some(&dec!(1.23)));
        assert!(venue.dust_calls().is_empty());
    }

    #[test]
    fn zero_after_truncation_counts_as_attempt_without_submitting() {
        // 0.00004 is zero at 4 digits and below.
        let venue = MockVenue::builder()
            .with_balance("SHIB", dec!(0.00004))
            .with_price("SHIBBTC", dec!(0.0000001))
            .build();

        let result = run(&venue, None).unwrap();
        assert!(venue.sells().is_empty());
        assert_eq!(result.attempts.len(), 5);
        assert!(
            result
                .attempts
                .iter()
                .all(|a| a.outcome == AttemptOutcome::BelowMinimum && a.quantity.is_zero())
        );
        assert_eq!(result.converted, vec![Asset::new("SHIB")]);
    }

    #[test]
    fn order_rejection_ends_chain_as_dust() {
        let venue = MockVenue::builder()
            .with_balance("ETH", dec!(2))
            .with_price("ETHBTC", dec!(0.05))
            .sell_script("ETH", SellScript::Reject("market closed".into()))
            .build();

        let result = run(&venue, None).unwrap();
        assert_eq!(venue.sells().len(), 1);
        assert!(matches!(result.attempts[0].outcome, AttemptOutcome::Rejected(_)));
        assert_eq!(venue.dust_calls(), vec![vec![Asset::new("ETH")]]);
    }

    #[test]
    fn accepted_order_with_nothing_executed_is_dust() {
        let venue = MockVenue::builder()
            .with_balance("ETH", dec!(2))
            .with_price("ETHBTC", dec!(0.05))
            .sell_script("ETH", SellScript::Expire)
            .dust_mode(DustMode::Fail)
            .build();

        let result = run(&venue, None).unwrap();
        assert!(!result.sold.contains_key(&Asset::new("ETH")));
        assert_eq!(result.attempts.len(), 1);
        assert!(matches!(result.attempts[0].outcome, AttemptOutcome::Rejected(_)));
        assert_eq!(venue.dust_calls(), vec![vec![Asset::new("ETH")]]);
        assert_eq!(result.unsold, vec![Asset::new("ETH")]);
        assert!(!result.is_complete());
    }

    #[test]
    fn partial_fill_records_remainder() {
        let venue = MockVenue::builder()
            .with_balance("ADA", dec!(100.5))
            .with_price("ADABTC", dec!(0.00001))
            .sell_script("ADA", SellScript::FillUpTo(dec!(60)))
            .build();

        let result = run(&venue, None).unwrap();
        let ada = Asset::new("ADA");
        assert_eq!(result.sold.get(&ada), Some(&dec!(60)));
        assert_eq!(result.unfilled.get(&ada), Some(&dec!(40.5)));
        assert_eq!(
            result.attempts[0].outcome,
            AttemptOutcome::PartiallyFilled(dec!(60))
        );
        assert!(venue.dust_calls().is_empty());
        assert_eq!(result.leftovers(), vec![&ada]);
        assert!(!result.is_complete());
        assert!(result.to_string().contains("unfilled:  ADA"));
    }

    #[test]
    fn connection_failure_propagates() {
        let venue = MockVenue::builder()
            .with_balance("ETH", dec!(2))
            .with_price("ETHBTC", dec!(0.05))
            .default_script(SellScript::VenueDown)
            .build();

        let err = run(&venue, None).unwrap_err();
        assert!(matches!(err, Error::Venue(BrokerError::Connection(_))));
    }

    #[test]
    fn dust_conversion_venue_down_propagates() {
        let venue = MockVenue::builder()
            .with_balance("ETH", dec!(2))
            .with_price("ETHBTC", dec!(0.05))
            .sell_script("ETH", SellScript::AlwaysBelowMinimum)
            .dust_mode(DustMode::VenueDown)
            .build();

        assert!(matches!(
            run(&venue, None),
            Err(Error::Venue(BrokerError::Connection(_)))
        ));
    }

    #[test]
    fn precision_above_limit_is_rejected() {
        let venue = MockVenue::builder().with_balance("ETH", dec!(1)).build();
        let snapshot = venue.balances().unwrap();
        let err = liquidate_all(&venue, &snapshot, &PriceTable::new(), &btc(), None, 9);
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn display_lists_outcomes() {
        let venue = MockVenue::builder()
            .with_balance("ETH", dec!(2))
            .with_balance("XYZ", dec!(5))
            .with_price("ETHBTC", dec!(0.05))
            .build();

        let text = run(&venue, None).unwrap().to_string();
        assert!(text.contains("FILLED"));
        assert!(text.contains("skipped:   XYZ"));
    }
}
