//! Validation errors for snapshot and plan construction.

use rust_decimal::Decimal;

/// Errors returned when building snapshots, price tables or plans.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Asset ticker was empty.
    #[error("asset ticker must not be empty")]
    EmptyAsset,

    /// Asset ticker contained characters other than ASCII alphanumerics.
    #[error("invalid asset ticker: {0}")]
    InvalidAsset(String),

    /// A balance was below zero.
    #[error("negative balance for {asset}: {quantity}")]
    NegativeQuantity { asset: String, quantity: Decimal },

    /// A price was zero or below.
    #[error("non-positive price for {pair}: {price}")]
    NonPositivePrice { pair: String, price: Decimal },

    /// Requested more decimal digits than the venue can express.
    #[error("precision {0} exceeds the maximum of {max}", max = crate::MAX_PRECISION)]
    PrecisionTooLarge(u32),
}
