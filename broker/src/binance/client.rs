//! Binance REST API client.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::debug;
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use zeroize::Zeroizing;

use super::auth;
use super::types::{
    AccountInfo, ApiErrorBody, DustTransferResponse, OpenOrderInfo, OrderResponse, TickerPrice,
};
use crate::error::BrokerError;

const LIVE_URL: &str = "https://api.binance.com";
const TESTNET_URL: &str = "https://testnet.binance.vision";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking Binance REST client.
pub struct BinanceClient {
    client: Client,
    api_key: String,
    secret_key: Zeroizing<String>,
    base_url: String,
}

impl BinanceClient {
    /// Create a new Binance client.
    pub fn new(api_key: &str, secret_key: &str, testnet: bool) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            secret_key: Zeroizing::new(secret_key.to_string()),
            base_url: (if testnet { TESTNET_URL } else { LIVE_URL }).to_string(),
        })
    }

    /// Point the client at a different host (proxies, test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Test connectivity (GET /api/v3/ping).
    pub fn ping(&self) -> Result<(), BrokerError> {
        let url = format!("{}/api/v3/ping", self.base_url);
        self.send::<serde_json::Value>(self.client.get(&url), "ping")?;
        Ok(())
    }

    /// Get account information (GET /api/v3/account).
    pub fn account_info(&self) -> Result<AccountInfo, BrokerError> {
        let query = self.signed("");
        let url = format!("{}/api/v3/account?{query}", self.base_url);
        self.send(self.authed(self.client.get(&url)), "account")
    }

    /// Last price of every listed pair (GET /api/v3/ticker/price).
    pub fn ticker_prices(&self) -> Result<Vec<TickerPrice>, BrokerError> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        self.send(self.client.get(&url), "ticker")
    }

    /// Submit a market sell (POST /api/v3/order).
    pub fn market_sell(&self, symbol: &str, quantity: &str) -> Result<OrderResponse, BrokerError> {
        let body = self.signed(&format!(
            "symbol={symbol}&side=SELL&type=MARKET&quantity={quantity}&newOrderRespType=RESULT"
        ));
        let url = format!("{}/api/v3/order", self.base_url);

        debug!("Submitting Binance market sell: {symbol} {quantity}");

        self.send(self.authed(self.form(self.client.post(&url), body)), "order")
    }

    /// Convert small balances to BNB (POST /sapi/v1/asset/dust).
    pub fn dust_transfer(&self, assets: &[&str]) -> Result<DustTransferResponse, BrokerError> {
        let params = assets
            .iter()
            .map(|a| format!("asset={a}"))
            .collect::<Vec<_>>()
            .join("&");
        let body = self.signed(&params);
        let url = format!("{}/sapi/v1/asset/dust", self.base_url);

        debug!("Requesting Binance dust transfer for {}", assets.join(","));

        self.send(self.authed(self.form(self.client.post(&url), body)), "dust transfer")
    }

    /// All open orders across symbols (GET /api/v3/openOrders).
    pub fn open_orders(&self) -> Result<Vec<OpenOrderInfo>, BrokerError> {
        let query = self.signed("");
        let url = format!("{}/api/v3/openOrders?{query}", self.base_url);
        self.send(self.authed(self.client.get(&url)), "open orders")
    }

    /// Cancel an order (DELETE /api/v3/order).
    pub fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<(), BrokerError> {
        let query = self.signed(&format!("symbol={symbol}&orderId={order_id}"));
        let url = format!("{}/api/v3/order?{query}", self.base_url);
        self.send::<serde_json::Value>(self.authed(self.client.delete(&url)), "cancel")?;
        Ok(())
    }

    fn signed(&self, params: &str) -> String {
        auth::signed_query(params, current_timestamp_ms(), &self.secret_key)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("X-MBX-APIKEY", &self.api_key)
    }

    fn form(&self, request: RequestBuilder, body: String) -> RequestBuilder {
        request
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, BrokerError> {
        let resp = request
            .send()
            .map_err(|e| BrokerError::Connection(format!("{what} request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body, what));
        }

        resp.json::<T>()
            .map_err(|e| BrokerError::Connection(format!("failed to parse {what}: {e}")))
    }
}

/// Map a non-2xx Binance response to a [`BrokerError`].
///
/// Lot-size and notional filter failures become `BelowMinimum` so callers
/// can retry with fewer decimals.
pub fn classify_error(status: u16, body: &str, what: &str) -> BrokerError {
    if status == 429 || status == 418 {
        return BrokerError::RateLimit;
    }

    if let Ok(err) = serde_json::from_str::<ApiErrorBody>(body) {
        if err.code == -1013 || err.msg.contains("LOT_SIZE") || err.msg.contains("NOTIONAL") {
            return BrokerError::BelowMinimum(format!("{} ({})", err.msg, err.code));
        }
        match err.code {
            -2014 | -2015 | -1022 => {
                return BrokerError::Auth(format!("{what}: {} ({})", err.msg, err.code));
            }
            -1121 => return BrokerError::InvalidSymbol(err.msg),
            _ => {}
        }
    }

    if status == 401 {
        return BrokerError::Auth(format!("{what} returned {status}: {body}"));
    }
    if status >= 500 {
        return BrokerError::Connection(format!("{what} returned {status}: {body}"));
    }
    BrokerError::Order(format!("{what} returned {status}: {body}"))
}

/// Current timestamp in milliseconds.
fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
