//! Asset tickers.

use std::fmt;

use crate::error::ValidationError;

/// An exchange asset ticker such as `BTC` or `ETH`.
///
/// Always upper-case ASCII alphanumerics. Trading pairs are formed by plain
/// concatenation (`ETH` + `BTC` → `ETHBTC`), which is how spot venues key
/// their tickers.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Asset(String);

impl Asset {
    /// Create an asset, panicking on an invalid ticker.
    ///
    /// Intended for literals in tests and examples; use [`Asset::parse`] for
    /// anything coming off the wire.
    #[track_caller]
    pub fn new(ticker: &str) -> Self {
        match Self::parse(ticker) {
            Ok(asset) => asset,
            Err(e) => panic!("invalid asset {ticker:?}: {e}"),
        }
    }

    /// Parse a ticker, normalizing to upper case.
    pub fn parse(ticker: &str) -> Result<Self, ValidationError> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(ValidationError::EmptyAsset);
        }
        if !ticker.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidAsset(ticker.to_string()));
        }
        Ok(Self(ticker.to_ascii_uppercase()))
    }

    /// Like [`Asset::parse`] but returns `None` instead of an error.
    pub fn try_new(ticker: &str) -> Option<Self> {
        Self::parse(ticker).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trading pair of this asset quoted in `quote` (e.g. `ETHBTC`).
    pub fn pair(&self, quote: &Asset) -> String {
        format!("{}{}", self.0, quote.0)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for Asset {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Asset {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(Asset::new(" eth ").as_str(), "ETH");
    }

    #[test]
    fn rejects_empty_and_punctuation() {
        assert_eq!(Asset::parse("  "), Err(ValidationError::EmptyAsset));
        assert!(matches!(
            Asset::parse("ETH/BTC"),
            Err(ValidationError::InvalidAsset(_))
        ));
        assert!(Asset::try_new("LD-BTC").is_none());
    }

    #[test]
    fn pair_concatenates() {
        assert_eq!(Asset::new("ETH").pair(&Asset::new("BTC")), "ETHBTC");
    }

    #[test]
    fn display_respects_width() {
        assert_eq!(format!("{:6}|", Asset::new("BNB")), "BNB   |");
    }
}
