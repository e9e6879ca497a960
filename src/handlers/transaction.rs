use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header::HeaderMap},
};

use crate::AppState;
use crate::handlers::auth::actor_from_headers;
use crate::handlers::{ApiError, error_response, map_ledger_error};
use crate::models::transaction::{
    SubmitTransactionRequest, Transaction, TransactionListQuery, TransitionRequest,
};

/// POST /api/transactions
pub async fn submit_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let actor = actor_from_headers(&headers, state.admin_api_key.as_deref())?;

    let tx = state
        .transactions
        .submit(&actor.id, payload)
        .await
        .map_err(map_ledger_error)?;

    Ok((StatusCode::CREATED, Json(tx)))
}

/// GET /api/transactions
pub async fn list_my_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let actor = actor_from_headers(&headers, state.admin_api_key.as_deref())?;

    let transactions = state
        .transactions
        .list_for_user(&actor.id)
        .await
        .map_err(map_ledger_error)?;

    Ok(Json(transactions))
}

/// GET /api/transactions/{id}
pub async fn get_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let actor = actor_from_headers(&headers, state.admin_api_key.as_deref())?;

    let tx = state
        .transactions
        .get(&actor, &id)
        .await
        .map_err(map_ledger_error)?;

    Ok(Json(tx))
}

/// GET /api/admin/transactions?status=pending
pub async fn list_admin_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let actor = actor_from_headers(&headers, state.admin_api_key.as_deref())?;
    if !actor.is_admin() {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "Admin access required",
            "FORBIDDEN",
        ));
    }

    let transactions = state
        .transactions
        .list_by_status(query.status)
        .await
        .map_err(map_ledger_error)?;

    Ok(Json(transactions))
}

/// POST /api/admin/transactions/transition
pub async fn transition_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let actor = actor_from_headers(&headers, state.admin_api_key.as_deref())?;

    tracing::info!(
        transaction_id = %payload.transaction_id,
        target = %payload.status,
        actor_id = %actor.id,
        "Transition requested"
    );

    let tx = state
        .transactions
        .transition(
            &actor,
            &payload.transaction_id,
            payload.status,
            payload.admin_notes,
        )
        .await
        .map_err(map_ledger_error)?;

    Ok(Json(tx))
}
