use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};

use crate::AppState;
use crate::error::LedgerError;
use crate::models::error::ApiErrorResponse;

pub mod auth;
pub mod balance;
pub mod health;
pub mod notification;
pub mod price;
pub mod transaction;

pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/prices", get(price::get_prices))
        .route("/api/quote", get(price::get_quote))
        .route(
            "/api/transactions",
            post(transaction::submit_transaction).get(transaction::list_my_transactions),
        )
        .route("/api/transactions/{id}", get(transaction::get_transaction))
        .route(
            "/api/admin/transactions",
            get(transaction::list_admin_transactions),
        )
        .route(
            "/api/admin/transactions/transition",
            post(transaction::transition_transaction),
        )
        .route("/api/admin/balances/adjust", post(balance::adjust_balance))
        .route("/api/balances", get(balance::get_portfolio))
        .route("/api/notifications", get(notification::list_notifications))
        .route(
            "/api/notifications/{id}/read",
            post(notification::mark_notification_read),
        )
        .with_state(state)
}

pub fn error_response(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ApiErrorResponse {
            error: error.into(),
            code: Some(code.to_string()),
        }),
    )
}

/// Map LedgerError to HTTP response
pub fn map_ledger_error(err: LedgerError) -> ApiError {
    let status = match &err {
        LedgerError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
        LedgerError::ConversionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AlreadyTerminal { .. } | LedgerError::InsufficientBalance { .. } => {
            StatusCode::CONFLICT
        }
        LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
        LedgerError::ApprovalFailed(_)
        | LedgerError::CorruptRecord(_)
        | LedgerError::Storage(_) => {
            tracing::error!(code = err.code(), "Request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    // Database detail stays in the logs
    let message = match &err {
        LedgerError::Storage(_) => "Database error".to_string(),
        LedgerError::ApprovalFailed(_) => {
            "Approval could not be committed; the transaction is still pending".to_string()
        }
        other => other.to_string(),
    };

    error_response(status, message, err.code())
}
