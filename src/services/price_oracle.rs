//! Market price adapter
//!
//! Fetches USD prices and 24h change from CoinGecko's `/simple/price`, keeps
//! them in a short-lived cache and falls back to static defaults for anything
//! the API could not deliver. Callers never see an error.

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::asset::Asset;
use crate::models::price::{PriceSource, Quote};

/// Price decimals kept from the feed
const PRICE_DECIMALS: u32 = 8;

/// Request timeout against the market-data API
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Quotes for every requested asset. Missing or failed symbols are filled
    /// with fallback quotes.
    async fn get_prices(&self, assets: &[Asset]) -> HashMap<Asset, Quote>;

    async fn get_price(&self, asset: Asset) -> Quote {
        self.get_prices(&[asset])
            .await
            .remove(&asset)
            .unwrap_or_else(|| Quote::fallback(asset))
    }
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: f64,
    #[serde(default)]
    usd_24h_change: Option<f64>,
}

#[derive(Clone)]
pub struct CoinGeckoPriceOracle {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    cache: Arc<Cache<Asset, Quote>>,
}

impl CoinGeckoPriceOracle {
    pub fn new(base_url: String, api_key: Option<String>, cache_ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(Asset::ALL.len() as u64)
            .time_to_live(Duration::from_secs(cache_ttl_secs))
            .build();

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Arc::new(cache),
        }
    }

    async fn fetch_quotes(
        &self,
        assets: &[Asset],
    ) -> Result<HashMap<Asset, Quote>, Box<dyn std::error::Error + Send + Sync>> {
        let ids: Vec<&str> = assets.iter().filter_map(|a| a.coingecko_id()).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        tracing::info!("Fetching prices for {} from CoinGecko", ids.join(","));

        let url = format!("{}/simple/price", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(&[
                ("ids", ids.join(",").as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-pro-api-key", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(format!("CoinGecko API error {}: {}", status, error_text).into());
        }

        let data: HashMap<String, SimplePrice> = response.json().await?;

        Ok(quotes_from_response(assets, &data))
    }
}

/// Map a `/simple/price` payload back onto our assets, skipping unusable prices
fn quotes_from_response(
    assets: &[Asset],
    data: &HashMap<String, SimplePrice>,
) -> HashMap<Asset, Quote> {
    assets
        .iter()
        .filter_map(|asset| {
            let entry = data.get(asset.coingecko_id()?)?;
            let price = Decimal::from_f64_retain(entry.usd)?.round_dp(PRICE_DECIMALS);
            if price <= Decimal::ZERO {
                return None;
            }
            let change_24h = entry
                .usd_24h_change
                .and_then(Decimal::from_f64_retain)
                .map(|c| c.round_dp(4))
                .unwrap_or(Decimal::ZERO);
            Some((
                *asset,
                Quote {
                    price,
                    change_24h,
                    source: PriceSource::Live,
                },
            ))
        })
        .collect()
}

fn usd_quote() -> Quote {
    Quote {
        price: Decimal::ONE,
        change_24h: Decimal::ZERO,
        source: PriceSource::Live,
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoPriceOracle {
    async fn get_prices(&self, assets: &[Asset]) -> HashMap<Asset, Quote> {
        let mut quotes = HashMap::new();
        let mut missing = Vec::new();

        for asset in assets {
            if asset.is_fiat() {
                quotes.insert(*asset, usd_quote());
            } else if let Some(cached) = self.cache.get(asset).await {
                tracing::debug!("Cache hit for {}", asset);
                quotes.insert(*asset, cached);
            } else if !missing.contains(asset) {
                missing.push(*asset);
            }
        }

        if missing.is_empty() {
            return quotes;
        }

        match self.fetch_quotes(&missing).await {
            Ok(fetched) => {
                for (asset, quote) in fetched {
                    self.cache.insert(asset, quote.clone()).await;
                    quotes.insert(asset, quote);
                }
            }
            Err(e) => {
                tracing::warn!("Price fetch failed, using fallback prices: {}", e);
            }
        }

        for asset in missing {
            quotes.entry(asset).or_insert_with(|| {
                tracing::debug!("Using fallback price for {}", asset);
                Quote::fallback(asset)
            });
        }

        quotes
    }
}

/// Fixed prices; used by tests and when no market-data API is configured
#[derive(Clone, Default)]
pub struct StaticPriceFeed {
    prices: HashMap<Asset, Decimal>,
}

impl StaticPriceFeed {
    pub fn new(prices: HashMap<Asset, Decimal>) -> Self {
        Self { prices }
    }

    pub fn with_price(mut self, asset: Asset, price: Decimal) -> Self {
        self.prices.insert(asset, price);
        self
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn get_prices(&self, assets: &[Asset]) -> HashMap<Asset, Quote> {
        assets
            .iter()
            .map(|asset| {
                let quote = if asset.is_fiat() {
                    usd_quote()
                } else {
                    match self.prices.get(asset) {
                        Some(price) => Quote {
                            price: *price,
                            change_24h: Decimal::ZERO,
                            source: PriceSource::Live,
                        },
                        None => Quote::fallback(*asset),
                    }
                };
                (*asset, quote)
            })
            .collect()
    }
}
