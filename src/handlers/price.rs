use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;

use crate::AppState;
use crate::handlers::{ApiError, error_response, map_ledger_error};
use crate::models::asset::Asset;
use crate::models::price::{AssetPrice, ConversionQuote, PricesQuery, PricesResponse, QuoteQuery};
use crate::services::conversion::crypto_from_usd;

/// GET /api/prices?symbols=BTC,ETH
/// All supported assets when `symbols` is absent
pub async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<PricesResponse>, ApiError> {
    let assets: Vec<Asset> = match query.symbols.as_deref() {
        Some(symbols) => symbols
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<Asset>()
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e, "INVALID_SYMBOL"))
            })
            .collect::<Result<_, _>>()?,
        None => Asset::ALL.to_vec(),
    };

    let mut quotes = state.prices.get_prices(&assets).await;

    let mut prices = Vec::with_capacity(assets.len());
    for asset in assets {
        if let Some(quote) = quotes.remove(&asset) {
            prices.push(AssetPrice { asset, quote });
        }
    }

    Ok(Json(PricesResponse { prices }))
}

/// GET /api/quote?asset=BTC&usd=1000
/// Conversion preview with the minimum-deposit check the submit path applies
pub async fn get_quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<ConversionQuote>, ApiError> {
    let asset: Asset = query
        .asset
        .parse()
        .map_err(|e: String| error_response(StatusCode::BAD_REQUEST, e, "INVALID_SYMBOL"))?;

    if query.usd <= Decimal::ZERO {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Amount must be greater than 0",
            "VALIDATION_FAILED",
        ));
    }

    let price = state.prices.get_price(asset).await.price;
    let crypto_amount = crypto_from_usd(query.usd, price, asset).map_err(map_ledger_error)?;
    let minimum_usd = state.limits.minimum_for(asset);
    let error = state
        .limits
        .validate(query.usd, asset)
        .err()
        .map(|e| e.to_string());

    Ok(Json(ConversionQuote {
        asset,
        usd_amount: query.usd,
        price,
        crypto_amount,
        minimum_usd,
        meets_minimum: error.is_none(),
        error,
    }))
}
