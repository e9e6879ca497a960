//! Notification emitter
//!
//! Builds the user-facing message for a ledger event and hands it to a
//! `NotificationSink`. Delivery is fire-and-forget: callers log failures and
//! never undo a committed ledger change because of them.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};
use std::sync::Arc;
use std::time::Duration;

use crate::entities::notifications::{self, Entity as Notifications};
use crate::error::LedgerResult;
use crate::models::balance::AdjustmentDirection;
use crate::models::notification::NewNotification;
use crate::models::transaction::{Transaction, TransactionKind, TransactionStatus};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        notification: &NewNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Deliver and log; failures never propagate
pub async fn dispatch(sink: &dyn NotificationSink, notification: NewNotification) {
    match sink.notify(&notification).await {
        Ok(()) => tracing::debug!(
            user_id = %notification.user_id,
            title = %notification.title,
            "Notification sent"
        ),
        Err(e) => tracing::warn!(
            user_id = %notification.user_id,
            error = %e,
            "Failed to send notification"
        ),
    }
}

/// Notification describing the outcome of an admin review
pub fn transition_notification(tx: &Transaction) -> NewNotification {
    let kind = match tx.kind {
        TransactionKind::Deposit => "Deposit",
        TransactionKind::Withdrawal => "Withdrawal",
    };
    let (title, mut message) = match tx.status {
        TransactionStatus::Approved => (
            format!("{} Approved", kind),
            format!(
                "Your {} of {} {} (${}) has been approved.",
                tx.kind, tx.crypto_amount, tx.asset, tx.usd_value
            ),
        ),
        TransactionStatus::Rejected => (
            format!("{} Rejected", kind),
            format!(
                "Your {} of {} {} (${}) has been rejected.",
                tx.kind, tx.crypto_amount, tx.asset, tx.usd_value
            ),
        ),
        TransactionStatus::Pending => (
            format!("{} Submitted", kind),
            format!(
                "Your {} of {} {} (${}) is awaiting review.",
                tx.kind, tx.crypto_amount, tx.asset, tx.usd_value
            ),
        ),
    };
    if let Some(notes) = tx.admin_notes.as_deref().filter(|n| !n.trim().is_empty()) {
        message.push_str(&format!(" Reason: {}", notes.trim()));
    }

    NewNotification {
        user_id: tx.user_id.clone(),
        title,
        message,
        metadata: serde_json::json!({
            "transactionId": tx.id,
            "kind": tx.kind,
            "asset": tx.asset,
            "cryptoAmount": tx.crypto_amount,
            "usdValue": tx.usd_value,
            "status": tx.status,
        }),
    }
}

/// Notification for an admin balance adjustment
pub fn adjustment_notification(
    tx: &Transaction,
    direction: AdjustmentDirection,
) -> NewNotification {
    let verb = match direction {
        AdjustmentDirection::Add => "credited to",
        AdjustmentDirection::Subtract => "debited from",
    };
    let mut message = format!(
        "{} {} (${}) was {} your account by an administrator.",
        tx.crypto_amount, tx.asset, tx.usd_value, verb
    );
    if let Some(notes) = tx.admin_notes.as_deref().filter(|n| !n.trim().is_empty()) {
        message.push_str(&format!(" Note: {}", notes.trim()));
    }

    NewNotification {
        user_id: tx.user_id.clone(),
        title: "Balance Adjusted".to_string(),
        message,
        metadata: serde_json::json!({
            "transactionId": tx.id,
            "asset": tx.asset,
            "cryptoAmount": tx.crypto_amount,
            "usdValue": tx.usd_value,
            "direction": direction,
        }),
    }
}

/// Stores notifications in the user's inbox table
#[derive(Clone)]
pub struct DbNotificationSink {
    db: DatabaseConnection,
}

impl DbNotificationSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationSink for DbNotificationSink {
    async fn notify(
        &self,
        notification: &NewNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let row = notifications::ActiveModel {
            user_id: Set(notification.user_id.clone()),
            title: Set(notification.title.clone()),
            message: Set(notification.message.clone()),
            metadata: Set(Some(notification.metadata.clone())),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        row.insert(&self.db).await?;
        Ok(())
    }
}

/// Posts notifications to an HTTP relay that turns them into e-mails
#[derive(Clone)]
pub struct EmailRelaySink {
    client: Client,
    relay_url: String,
}

impl EmailRelaySink {
    pub fn new(relay_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, relay_url }
    }
}

#[async_trait]
impl NotificationSink for EmailRelaySink {
    async fn notify(
        &self,
        notification: &NewNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(notification)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("Email relay error {}: {}", status, error_text).into());
        }
        Ok(())
    }
}

/// Delivers to every sink; the first failure is reported after all were tried
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    async fn notify(
        &self,
        notification: &NewNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.notify(notification).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Inbox for a user, newest first
pub async fn list_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> LedgerResult<Vec<notifications::Model>> {
    Ok(Notifications::find()
        .filter(notifications::Column::UserId.eq(user_id))
        .order_by_desc(notifications::Column::CreatedAt)
        .order_by_desc(notifications::Column::Id)
        .all(db)
        .await?)
}

/// Mark one of the user's notifications read. Returns false when the
/// notification does not exist or belongs to someone else.
pub async fn mark_read(db: &DatabaseConnection, user_id: &str, id: i32) -> LedgerResult<bool> {
    let result = Notifications::update_many()
        .col_expr(notifications::Column::IsRead, Expr::value(true))
        .filter(notifications::Column::Id.eq(id))
        .filter(notifications::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}
