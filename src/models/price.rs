use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::asset::Asset;

/// Where a quote came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Live,
    Fallback,
}

/// USD price and 24h change for one asset at the moment of computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub price: Decimal,
    /// 24h change in percent
    pub change_24h: Decimal,
    pub source: PriceSource,
}

impl Quote {
    pub fn fallback(asset: Asset) -> Self {
        Self {
            price: asset.fallback_price(),
            change_24h: Decimal::ZERO,
            source: PriceSource::Fallback,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricesQuery {
    /// Comma separated symbols; all supported assets when absent
    pub symbols: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetPrice {
    pub asset: Asset,
    #[serde(flatten)]
    pub quote: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesResponse {
    pub prices: Vec<AssetPrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteQuery {
    pub asset: String,
    pub usd: Decimal,
}

/// Conversion preview shown before a user submits a deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionQuote {
    pub asset: Asset,
    pub usd_amount: Decimal,
    pub price: Decimal,
    pub crypto_amount: Decimal,
    pub minimum_usd: Decimal,
    pub meets_minimum: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
