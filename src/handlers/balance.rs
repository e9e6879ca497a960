use axum::{
    Json,
    extract::State,
    http::header::HeaderMap,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::AppState;
use crate::handlers::auth::actor_from_headers;
use crate::handlers::{ApiError, map_ledger_error};
use crate::models::asset::Asset;
use crate::models::balance::{
    AdjustBalanceRequest, AdjustBalanceResponse, BalanceEntry, PortfolioPosition,
    PortfolioResponse,
};
use crate::models::price::{PriceSource, Quote};
use crate::services::conversion::round_usd;
use crate::services::ledger;

/// GET /api/balances
/// Holdings valued at current market prices
pub async fn get_portfolio(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PortfolioResponse>, ApiError> {
    let actor = actor_from_headers(&headers, state.admin_api_key.as_deref())?;

    let entries = ledger::list_for_user(&state.db, &actor.id)
        .await
        .map_err(map_ledger_error)?;

    let assets: Vec<Asset> = entries.iter().map(|e| e.asset).collect();
    let quotes = if assets.is_empty() {
        HashMap::new()
    } else {
        state.prices.get_prices(&assets).await
    };

    Ok(Json(value_portfolio(&actor.id, &entries, &quotes)))
}

/// POST /api/admin/balances/adjust
pub async fn adjust_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AdjustBalanceRequest>,
) -> Result<Json<AdjustBalanceResponse>, ApiError> {
    let actor = actor_from_headers(&headers, state.admin_api_key.as_deref())?;

    let response = state
        .adjustments
        .adjust(&actor, payload)
        .await
        .map_err(map_ledger_error)?;

    Ok(Json(response))
}

fn value_portfolio(
    user_id: &str,
    entries: &[BalanceEntry],
    quotes: &HashMap<Asset, Quote>,
) -> PortfolioResponse {
    let positions: Vec<PortfolioPosition> = entries
        .iter()
        .map(|entry| {
            let quote = quotes
                .get(&entry.asset)
                .cloned()
                .unwrap_or_else(|| Quote::fallback(entry.asset));
            let market_value = round_usd(entry.amount * quote.price);
            let cost_basis = round_usd(entry.amount * entry.average_buy_price);

            PortfolioPosition {
                asset: entry.asset,
                amount: entry.amount,
                average_buy_price: entry.average_buy_price,
                current_price: quote.price,
                change_24h: quote.change_24h,
                market_value,
                cost_basis,
                unrealized_pnl: market_value - cost_basis,
                stale_price: quote.source == PriceSource::Fallback,
            }
        })
        .collect();

    let total_value = positions.iter().map(|p| p.market_value).sum::<Decimal>();
    let total_cost = positions.iter().map(|p| p.cost_basis).sum::<Decimal>();

    PortfolioResponse {
        user_id: user_id.to_string(),
        positions,
        total_value,
        total_cost,
    }
}
