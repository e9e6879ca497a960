use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::balances;
use crate::error::LedgerError;
use crate::models::asset::Asset;
use crate::services::conversion::round_crypto;

/// One (user, asset) ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub user_id: String,
    pub asset: Asset,
    pub amount: Decimal,
    /// USD cost basis per unit
    pub average_buy_price: Decimal,
    pub updated_at: DateTime<FixedOffset>,
}

impl TryFrom<balances::Model> for BalanceEntry {
    type Error = LedgerError;

    fn try_from(model: balances::Model) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, err: String| {
            LedgerError::CorruptRecord(format!(
                "balance {}/{} {}: {}",
                model.user_id, model.asset, field, err
            ))
        };

        let asset = model.asset.parse().map_err(|e| corrupt("asset", e))?;
        if model.amount.is_sign_negative() || model.average_buy_price.is_sign_negative() {
            return Err(corrupt("amount", "negative value".to_string()));
        }
        let amount = round_crypto(model.amount);
        let average_buy_price = model.average_buy_price.normalize();

        Ok(Self {
            user_id: model.user_id,
            asset,
            amount,
            average_buy_price,
            updated_at: model.updated_at,
        })
    }
}

/// A holding valued at the current market price
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPosition {
    pub asset: Asset,
    pub amount: Decimal,
    pub average_buy_price: Decimal,
    pub current_price: Decimal,
    pub change_24h: Decimal,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_pnl: Decimal,
    /// True when the price came from static defaults rather than the live feed
    pub stale_price: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub user_id: String,
    pub positions: Vec<PortfolioPosition>,
    pub total_value: Decimal,
    pub total_cost: Decimal,
}

/// Direction of an admin balance adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    Add,
    Subtract,
}

/// POST /api/admin/balances/adjust body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustBalanceRequest {
    pub user_id: String,
    pub asset: String,
    pub direction: AdjustmentDirection,
    /// Positive USD amount, converted to the asset at the live price
    pub usd_amount: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Result of an admin adjustment: the new ledger row plus its audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustBalanceResponse {
    pub balance: BalanceEntry,
    pub transaction: crate::models::transaction::Transaction,
    pub price: Decimal,
}
