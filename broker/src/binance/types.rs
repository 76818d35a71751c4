//! Binance-specific API response types.

use serde::Deserialize;

/// Binance account balance entry.
#[derive(Debug, Deserialize)]
pub struct BalanceInfo {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

/// Binance account info response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub balances: Vec<BalanceInfo>,
    #[serde(default)]
    pub can_trade: bool,
}

/// Binance order response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: u64,
    pub status: String,
    pub executed_qty: String,
    #[serde(default)]
    pub cummulative_quote_qty: String,
}

/// Entry of the last-price ticker (GET /api/v3/ticker/price).
#[derive(Debug, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: String,
}

/// Binance open order entry (GET /api/v3/openOrders).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderInfo {
    pub symbol: String,
    pub order_id: u64,
    #[serde(default)]
    pub client_order_id: String,
    pub side: String,
}

/// Dust transfer response (POST /sapi/v1/asset/dust).
///
/// Field names keep Binance's spelling.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DustTransferResponse {
    #[serde(default)]
    pub total_service_charge: String,
    #[serde(default)]
    pub total_transfered: String,
    #[serde(default)]
    pub transfer_result: Vec<DustTransferResult>,
}

/// One converted asset inside a dust transfer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DustTransferResult {
    pub from_asset: String,
    pub amount: String,
    #[serde(default)]
    pub transfered_amount: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}
