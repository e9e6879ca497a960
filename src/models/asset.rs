//! Supported assets
//!
//! Every transaction and balance row is keyed by one of these symbols. The
//! string form (`"BTC"`, `"USD"`, ...) is what is stored and sent over the wire.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Btc,
    Eth,
    Usdt,
    Sol,
    Ada,
    Bnb,
    Xrp,
    Doge,
    Usd,
}

impl Asset {
    pub const ALL: [Asset; 9] = [
        Asset::Btc,
        Asset::Eth,
        Asset::Usdt,
        Asset::Sol,
        Asset::Ada,
        Asset::Bnb,
        Asset::Xrp,
        Asset::Doge,
        Asset::Usd,
    ];

    /// Fiat balances are held in USD directly and never priced.
    pub fn is_fiat(&self) -> bool {
        matches!(self, Asset::Usd)
    }

    /// CoinGecko coin id, `None` for fiat
    pub fn coingecko_id(&self) -> Option<&'static str> {
        match self {
            Asset::Btc => Some("bitcoin"),
            Asset::Eth => Some("ethereum"),
            Asset::Usdt => Some("tether"),
            Asset::Sol => Some("solana"),
            Asset::Ada => Some("cardano"),
            Asset::Bnb => Some("binancecoin"),
            Asset::Xrp => Some("ripple"),
            Asset::Doge => Some("dogecoin"),
            Asset::Usd => None,
        }
    }

    /// Static USD price used when the market-data API is unavailable
    pub fn fallback_price(&self) -> Decimal {
        match self {
            Asset::Btc => dec!(65000),
            Asset::Eth => dec!(3500),
            Asset::Usdt => dec!(1),
            Asset::Sol => dec!(150),
            Asset::Ada => dec!(0.45),
            Asset::Bnb => dec!(600),
            Asset::Xrp => dec!(0.55),
            Asset::Doge => dec!(0.12),
            Asset::Usd => dec!(1),
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Btc => write!(f, "BTC"),
            Asset::Eth => write!(f, "ETH"),
            Asset::Usdt => write!(f, "USDT"),
            Asset::Sol => write!(f, "SOL"),
            Asset::Ada => write!(f, "ADA"),
            Asset::Bnb => write!(f, "BNB"),
            Asset::Xrp => write!(f, "XRP"),
            Asset::Doge => write!(f, "DOGE"),
            Asset::Usd => write!(f, "USD"),
        }
    }
}

impl std::str::FromStr for Asset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BTC" => Ok(Asset::Btc),
            "ETH" => Ok(Asset::Eth),
            "USDT" => Ok(Asset::Usdt),
            "SOL" => Ok(Asset::Sol),
            "ADA" => Ok(Asset::Ada),
            "BNB" => Ok(Asset::Bnb),
            "XRP" => Ok(Asset::Xrp),
            "DOGE" => Ok(Asset::Doge),
            "USD" => Ok(Asset::Usd),
            _ => Err(format!("Unsupported asset: {}", s)),
        }
    }
}
