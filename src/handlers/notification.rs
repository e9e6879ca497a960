use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header::HeaderMap},
};

use crate::AppState;
use crate::handlers::auth::actor_from_headers;
use crate::handlers::{ApiError, error_response, map_ledger_error};
use crate::models::notification::{NotificationListResponse, NotificationResponse};
use crate::services::notifier;

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let actor = actor_from_headers(&headers, state.admin_api_key.as_deref())?;

    let notifications: Vec<NotificationResponse> = notifier::list_for_user(&state.db, &actor.id)
        .await
        .map_err(map_ledger_error)?
        .into_iter()
        .map(NotificationResponse::from)
        .collect();
    let unread = notifications.iter().filter(|n| !n.is_read).count();

    Ok(Json(NotificationListResponse {
        notifications,
        unread,
    }))
}

/// POST /api/notifications/{id}/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let actor = actor_from_headers(&headers, state.admin_api_key.as_deref())?;

    let updated = notifier::mark_read(&state.db, &actor.id, id)
        .await
        .map_err(map_ledger_error)?;

    if !updated {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Notification {} not found", id),
            "NOT_FOUND",
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}
