//! Binance spot venue implementation.

pub mod auth;
pub mod client;
pub mod types;

use std::str::FromStr;

use freqkeeper::{Asset, BalanceSnapshot, PriceTable};
use log::{debug, warn};
use rust_decimal::Decimal;

use crate::Venue;
use crate::error::BrokerError;
use crate::types::*;
use client::BinanceClient;

/// Binance spot venue implementing the generic Venue trait.
///
/// Uses REST API for all operations. Blocking (sync) via reqwest::blocking.
pub struct BinanceVenue {
    client: BinanceClient,
}

impl BinanceVenue {
    /// Build a client and check connectivity with a ping.
    pub fn connect(api_key: &str, secret_key: &str, testnet: bool) -> Result<Self, BrokerError> {
        let client = BinanceClient::new(api_key, secret_key, testnet)?;
        client.ping()?;
        Ok(Self { client })
    }

    /// Wrap an existing client without pinging.
    pub fn from_client(client: BinanceClient) -> Self {
        Self { client }
    }
}

/// Parse a decimal string from a Binance payload.
fn parse_decimal(s: &str, field: &str) -> Result<Decimal, BrokerError> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| BrokerError::Connection(format!("bad {field} {s:?}: {e}")))
}

impl Venue for BinanceVenue {
    fn balances(&self) -> Result<BalanceSnapshot, BrokerError> {
        let info = self.client.account_info()?;

        let mut snapshot = BalanceSnapshot::new();
        for b in &info.balances {
            let Some(asset) = Asset::try_new(&b.asset) else {
                warn!("Skipping unrecognized asset {:?}", b.asset);
                continue;
            };
            let free = parse_decimal(&b.free, "free balance")?;
            snapshot
                .insert(asset, free)
                .map_err(|e| BrokerError::Other(e.to_string()))?;
        }

        debug!("Fetched {} balances", snapshot.len());
        Ok(snapshot)
    }

    fn prices(&self) -> Result<PriceTable, BrokerError> {
        let tickers = self.client.ticker_prices()?;

        let mut table = PriceTable::new();
        for t in &tickers {
            let price = parse_decimal(&t.price, "price")?;
            // Delisted pairs report a zero price.
            if price > Decimal::ZERO {
                table
                    .insert(&t.symbol, price)
                    .map_err(|e| BrokerError::Other(e.to_string()))?;
            }
        }

        debug!("Fetched {} prices", table.len());
        Ok(table)
    }

    fn market_sell(&self, order: &MarketSell) -> Result<Fill, BrokerError> {
        let pair = order.pair();
        let quantity = order.quantity.normalize().to_string();
        let resp = self.client.market_sell(&pair, &quantity)?;

        Ok(Fill {
            order_id: resp.order_id,
            pair: resp.symbol,
            status: OrderState::from_venue(&resp.status),
            executed_qty: parse_decimal(&resp.executed_qty, "executedQty")?,
            quote_qty: if resp.cummulative_quote_qty.is_empty() {
                Decimal::ZERO
            } else {
                parse_decimal(&resp.cummulative_quote_qty, "cummulativeQuoteQty")?
            },
        })
    }

    fn convert_dust(&self, assets: &[Asset]) -> Result<DustConversion, BrokerError> {
        let names: Vec<&str> = assets.iter().map(Asset::as_str).collect();
        let resp = self.client.dust_transfer(&names)?;

        let converted = resp
            .transfer_result
            .iter()
            .filter_map(|r| Asset::try_new(&r.from_asset))
            .collect();
        let total_received = if resp.total_transfered.is_empty() {
            Decimal::ZERO
        } else {
            parse_decimal(&resp.total_transfered, "totalTransfered")?
        };

        Ok(DustConversion {
            converted,
            total_received,
        })
    }

    fn open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError> {
        let orders = self.client.open_orders()?;
        Ok(orders
            .into_iter()
            .map(|o| OpenOrder {
                order_id: o.order_id,
                side: if o.side == "BUY" { Side::Buy } else { Side::Sell },
                pair: o.symbol,
                client_order_id: o.client_order_id,
            })
            .collect())
    }

    fn cancel_order(&self, order: &OpenOrder) -> Result<(), BrokerError> {
        self.client.cancel_order(&order.pair, order.order_id)
    }
}
