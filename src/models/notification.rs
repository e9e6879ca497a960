use serde::{Deserialize, Serialize};

use crate::entities::notifications;

/// A user-facing message produced after a ledger event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: i32,
    pub title: String,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: String,
}

impl From<notifications::Model> for NotificationResponse {
    fn from(model: notifications::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            message: model.message,
            metadata: model.metadata,
            is_read: model.is_read,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub unread: usize,
}
