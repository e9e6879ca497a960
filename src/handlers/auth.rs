//! Caller identity from the upstream auth gateway
//!
//! The gateway forwards `x-user-id` and `x-user-role`. An `admin` role is only
//! honored when the request also carries the shared `x-api-key`; otherwise the
//! caller is treated as a regular user.

use axum::http::{StatusCode, header::HeaderMap};

use crate::handlers::{ApiError, error_response};
use crate::models::actor::{Actor, Role};

pub fn actor_from_headers(headers: &HeaderMap, admin_api_key: Option<&str>) -> Result<Actor, ApiError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            error_response(
                StatusCode::UNAUTHORIZED,
                "Missing user identity",
                "UNAUTHORIZED",
            )
        })?;

    let role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.parse::<Role>()
                .map_err(|e| error_response(StatusCode::UNAUTHORIZED, e, "UNAUTHORIZED"))
        })
        .transpose()?
        .unwrap_or(Role::User);

    if role == Role::Admin && !has_admin_key(headers, admin_api_key) {
        tracing::warn!(user_id = %user_id, "Admin role without a valid API key, treating as user");
        return Ok(Actor::user(user_id));
    }

    Ok(Actor {
        id: user_id.to_string(),
        role,
    })
}

fn has_admin_key(headers: &HeaderMap, admin_api_key: Option<&str>) -> bool {
    let Some(expected) = admin_api_key else {
        return false;
    };
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| provided == expected)
}
