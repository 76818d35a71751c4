//! Venue construction from config.

use freqkeeper_broker::Venue;
use freqkeeper_broker::binance::BinanceVenue;
use log::info;

use crate::config::{BotConfig, LiquidationConfig};
use crate::error::{Error, Result};

/// Connect to the venue named in `[liquidation]` with the bot's exchange
/// credentials.
///
/// This is the only place that knows which venue is in use.
pub fn connect_venue(liquidation: &LiquidationConfig, bot: &BotConfig) -> Result<Box<dyn Venue>> {
    match liquidation.venue.as_str() {
        "binance" => {
            info!(
                "Connecting {} to Binance{}",
                bot.name,
                if liquidation.testnet { " testnet" } else { "" }
            );
            let venue = BinanceVenue::connect(
                &bot.exchange_key,
                bot.exchange_secret.expose(),
                liquidation.testnet,
            )?;
            Ok(Box::new(venue))
        }
        other => Err(Error::Config(format!("unknown venue {other:?}"))),
    }
}
