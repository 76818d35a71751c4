//! Mock venue for testing. Implements the `Venue` trait with scripted behavior.
//!
//! Use this in integration tests to simulate venue responses without network calls.
//!
//! ```ignore
//! use freqkeeper::Asset;
//! use freqkeeper_broker::mock::{MockVenue, SellScript};
//!
//! let venue = MockVenue::builder()
//!     .with_balance("ETH", dec!(2.0))
//!     .with_price("ETHBTC", dec!(0.05))
//!     .sell_script("ETH", SellScript::LotStep(2))
//!     .build();
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use freqkeeper::{Asset, BalanceSnapshot, PriceTable, truncate};
use rust_decimal::Decimal;

use crate::Venue;
use crate::error::BrokerError;
use crate::types::*;

/// How the mock venue answers a market sell for one asset.
#[derive(Clone, Debug)]
pub enum SellScript {
    /// Fill the full quantity.
    FillAll,
    /// Accept only quantities that are whole multiples of `10^-digits`;
    /// anything finer is rejected as below the lot size.
    LotStep(u32),
    /// Reject every attempt as below the lot size.
    AlwaysBelowMinimum,
    /// Reject every attempt with a non-lot-size order error.
    Reject(String),
    /// Accept the order but let it expire with nothing executed, as a
    /// market order does on a book without liquidity.
    Expire,
    /// Execute at most this base quantity; the rest of the order expires.
    FillUpTo(Decimal),
    /// Fail every attempt with a connection error.
    VenueDown,
}

/// How the mock venue answers a dust conversion.
#[derive(Clone, Debug)]
pub enum DustMode {
    /// Convert every requested asset.
    ConvertAll,
    /// Convert only the listed assets; the rest are silently left alone.
    ConvertOnly(Vec<Asset>),
    /// Reject the whole batch.
    Fail,
    /// Fail with a connection error.
    VenueDown,
}

/// Builder for `MockVenue`.
pub struct MockVenueBuilder {
    balances: Vec<(Asset, Decimal)>,
    prices: Vec<(String, Decimal)>,
    scripts: HashMap<Asset, SellScript>,
    default_script: SellScript,
    dust_mode: DustMode,
    open_orders: Vec<OpenOrder>,
}

impl MockVenueBuilder {
    pub fn with_balance(mut self, asset: &str, free: Decimal) -> Self {
        self.balances.push((Asset::new(asset), free));
        self
    }

    pub fn with_price(mut self, pair: &str, price: Decimal) -> Self {
        self.prices.push((pair.to_string(), price));
        self
    }

    pub fn sell_script(mut self, asset: &str, script: SellScript) -> Self {
        self.scripts.insert(Asset::new(asset), script);
        self
    }

    /// Script used for assets without their own.
    pub fn default_script(mut self, script: SellScript) -> Self {
        self.default_script = script;
        self
    }

    pub fn dust_mode(mut self, mode: DustMode) -> Self {
        self.dust_mode = mode;
        self
    }

    pub fn with_open_order(mut self, order_id: u64, pair: &str) -> Self {
        self.open_orders.push(OpenOrder {
            order_id,
            pair: pair.to_string(),
            client_order_id: format!("mock-{order_id}"),
            side: Side::Buy,
        });
        self
    }

    pub fn build(self) -> MockVenue {
        MockVenue {
            balances: self.balances,
            prices: self.prices,
            scripts: self.scripts,
            default_script: self.default_script,
            dust_mode: self.dust_mode,
            open_orders: self.open_orders,
            next_order_id: Mutex::new(1),
            sells: Mutex::new(Vec::new()),
            dust_calls: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }
}

/// A mock venue that records every call and returns scripted responses.
pub struct MockVenue {
    balances: Vec<(Asset, Decimal)>,
    prices: Vec<(String, Decimal)>,
    scripts: HashMap<Asset, SellScript>,
    default_script: SellScript,
    dust_mode: DustMode,
    open_orders: Vec<OpenOrder>,
    next_order_id: Mutex<u64>,
    sells: Mutex<Vec<MarketSell>>,
    dust_calls: Mutex<Vec<Vec<Asset>>>,
    cancelled: Mutex<Vec<u64>>,
}

impl MockVenue {
    pub fn builder() -> MockVenueBuilder {
        MockVenueBuilder {
            balances: Vec::new(),
            prices: Vec::new(),
            scripts: HashMap::new(),
            default_script: SellScript::FillAll,
            dust_mode: DustMode::ConvertAll,
            open_orders: Vec::new(),
        }
    }

    /// Every market sell submitted, in order (for assertion in tests).
    pub fn sells(&self) -> Vec<MarketSell> {
        self.sells.lock().unwrap().clone()
    }

    /// Market sells submitted for one asset.
    pub fn sells_of(&self, asset: &str) -> Vec<MarketSell> {
        self.sells()
            .into_iter()
            .filter(|s| s.base.as_str() == asset)
            .collect()
    }

    /// Every dust batch requested, in order.
    pub fn dust_calls(&self) -> Vec<Vec<Asset>> {
        self.dust_calls.lock().unwrap().clone()
    }

    /// Order IDs cancelled, in order.
    pub fn cancelled(&self) -> Vec<u64> {
        self.cancelled.lock().unwrap().clone()
    }

    fn fill(&self, order: &MarketSell) -> Fill {
        self.execute(order, order.quantity)
    }

    fn execute(&self, order: &MarketSell, executed_qty: Decimal) -> Fill {
        let mut next = self.next_order_id.lock().unwrap();
        let order_id = *next;
        *next += 1;
        let status = if executed_qty == order.quantity {
            OrderState::Filled
        } else {
            OrderState::Expired
        };
        Fill {
            order_id,
            pair: order.pair(),
            status,
            executed_qty,
            quote_qty: Decimal::ZERO,
        }
    }
}

impl Venue for MockVenue {
    fn balances(&self) -> Result<BalanceSnapshot, BrokerError> {
        BalanceSnapshot::from_free(self.balances.iter().cloned())
            .map_err(|e| BrokerError::Other(e.to_string()))
    }

    fn prices(&self) -> Result<PriceTable, BrokerError> {
        let mut table = PriceTable::new();
        for (pair, price) in &self.prices {
            table
                .insert(pair, *price)
                .map_err(|e| BrokerError::Other(e.to_string()))?;
        }
        Ok(table)
    }

    fn market_sell(&self, order: &MarketSell) -> Result<Fill, BrokerError> {
        self.sells.lock().unwrap().push(order.clone());

        if order.quantity <= Decimal::ZERO {
            return Err(BrokerError::BelowMinimum("mock: zero quantity".into()));
        }

        let script = self
            .scripts
            .get(&order.base)
            .unwrap_or(&self.default_script);

        match script {
            SellScript::FillAll => Ok(self.fill(order)),
            SellScript::LotStep(digits) => {
                if truncate(order.quantity, *digits) == order.quantity {
                    Ok(self.fill(order))
                } else {
                    Err(BrokerError::BelowMinimum(format!(
                        "mock: {} not a multiple of the {digits}-digit lot step",
                        order.quantity
                    )))
                }
            }
            SellScript::AlwaysBelowMinimum => Err(BrokerError::BelowMinimum(
                "mock: Filter failure: LOT_SIZE".into(),
            )),
            SellScript::Reject(msg) => Err(BrokerError::Order(format!("mock: {msg}"))),
            SellScript::Expire => Ok(self.execute(order, Decimal::ZERO)),
            SellScript::FillUpTo(cap) => Ok(self.execute(order, order.quantity.min(*cap))),
            SellScript::VenueDown => Err(BrokerError::Connection("mock: venue down".into())),
        }
    }

    fn convert_dust(&self, assets: &[Asset]) -> Result<DustConversion, BrokerError> {
        self.dust_calls.lock().unwrap().push(assets.to_vec());

        match &self.dust_mode {
            DustMode::ConvertAll => Ok(DustConversion {
                converted: assets.to_vec(),
                total_received: Decimal::ZERO,
            }),
            DustMode::ConvertOnly(allowed) => Ok(DustConversion {
                converted: assets
                    .iter()
                    .filter(|a| allowed.contains(a))
                    .cloned()
                    .collect(),
                total_received: Decimal::ZERO,
            }),
            DustMode::Fail => Err(BrokerError::Order("mock: dust conversion rejected".into())),
            DustMode::VenueDown => Err(BrokerError::Connection("mock: venue down".into())),
        }
    }

    fn open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError> {
        Ok(self.open_orders.clone())
    }

    fn cancel_order(&self, order: &OpenOrder) -> Result<(), BrokerError> {
        if !self.open_orders.iter().any(|o| o.order_id == order.order_id) {
            return Err(BrokerError::Order(format!(
                "mock: unknown order {}",
                order.order_id
            )));
        }
        self.cancelled.lock().unwrap().push(order.order_id);
        Ok(())
    }
}
