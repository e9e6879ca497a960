//! Runtime configuration loaded from the environment (`.env` via dotenvy)

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

use crate::services::conversion::DepositLimits;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_PRICE_CACHE_TTL_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    /// Shared secret the auth gateway sends with admin identities
    pub admin_api_key: Option<String>,
    pub coingecko_base_url: String,
    pub coingecko_api_key: Option<String>,
    pub price_cache_ttl_secs: u64,
    /// Optional HTTP relay that turns notifications into e-mails
    pub email_relay_url: Option<String>,
    pub deposit_limits: DepositLimits,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let mut deposit_limits = DepositLimits::default();
        if let Some(min) = parse_var::<Decimal>("MIN_DEPOSIT_USD")? {
            deposit_limits.fiat_minimum = min;
        }
        if let Some(min) = parse_var::<Decimal>("MIN_DEPOSIT_CRYPTO")? {
            deposit_limits.crypto_minimum = min;
        }

        Ok(Self {
            database_url,
            bind_addr: optional_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            admin_api_key: optional_var("ADMIN_API_KEY"),
            coingecko_base_url: optional_var("COINGECKO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_COINGECKO_BASE_URL.to_string()),
            coingecko_api_key: optional_var("COINGECKO_API_KEY"),
            price_cache_ttl_secs: parse_var("PRICE_CACHE_TTL_SECS")?
                .unwrap_or(DEFAULT_PRICE_CACHE_TTL_SECS),
            email_relay_url: optional_var("EMAIL_RELAY_URL"),
            deposit_limits,
        })
    }
}

/// Unset and empty variables are both treated as absent
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}
