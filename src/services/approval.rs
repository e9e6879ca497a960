//! Approval engine
//!
//! Turns an admin decision into a ledger mutation. The status write and the
//! balance write share one database transaction:
//!
//! 1. lock the transaction row and check it is still `pending`
//! 2. lock the (user, asset) balance row and compute the new holding
//! 3. compare-and-swap the status (`WHERE status = 'pending'`)
//! 4. upsert the absolute balance
//! 5. commit, then notify
//!
//! Any failure before commit rolls everything back and the transaction stays
//! `pending`.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect,
    TransactionTrait, sea_query::Expr,
};
use std::sync::Arc;

use crate::entities::transactions::{self, Entity as Transactions};
use crate::error::{LedgerError, LedgerResult};
use crate::models::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::services::ledger;
use crate::services::notifier::{self, NotificationSink};

#[derive(Clone)]
pub struct ApprovalEngine {
    db: DatabaseConnection,
    notifier: Arc<dyn NotificationSink>,
}

impl ApprovalEngine {
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { db, notifier }
    }

    /// Approve a pending transaction and apply it to the ledger
    pub async fn approve(
        &self,
        transaction_id: &str,
        admin_id: &str,
        notes: Option<String>,
    ) -> LedgerResult<Transaction> {
        self.decide(transaction_id, admin_id, TransactionStatus::Approved, notes)
            .await
    }

    /// Reject a pending transaction; the ledger is not touched
    pub async fn reject(
        &self,
        transaction_id: &str,
        admin_id: &str,
        notes: Option<String>,
    ) -> LedgerResult<Transaction> {
        self.decide(transaction_id, admin_id, TransactionStatus::Rejected, notes)
            .await
    }

    async fn decide(
        &self,
        transaction_id: &str,
        admin_id: &str,
        target: TransactionStatus,
        notes: Option<String>,
    ) -> LedgerResult<Transaction> {
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let txn = self.db.begin().await.map_err(approval_failed)?;

        let outcome = apply_decision(&txn, transaction_id, admin_id, target, notes).await;

        let decided = match outcome {
            Ok(decided) => {
                txn.commit().await.map_err(approval_failed)?;
                decided
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!(
                        transaction_id = %transaction_id,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                tracing::warn!(
                    transaction_id = %transaction_id,
                    target = %target,
                    error = %e,
                    "Transition aborted, transaction left pending"
                );
                return Err(e);
            }
        };

        tracing::info!(
            transaction_id = %decided.id,
            user_id = %decided.user_id,
            kind = %decided.kind,
            asset = %decided.asset,
            crypto_amount = %decided.crypto_amount,
            status = %decided.status,
            admin_id = %admin_id,
            "Transaction decided"
        );

        notifier::dispatch(
            self.notifier.as_ref(),
            notifier::transition_notification(&decided),
        )
        .await;

        Ok(decided)
    }
}

/// Everything that must happen inside the database transaction
async fn apply_decision<C: ConnectionTrait>(
    conn: &C,
    transaction_id: &str,
    admin_id: &str,
    target: TransactionStatus,
    notes: Option<String>,
) -> LedgerResult<Transaction> {
    let row = Transactions::find_by_id(transaction_id.to_string())
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(approval_failed)?
        .ok_or_else(|| LedgerError::NotFound(transaction_id.to_string()))?;

    let mut tx = Transaction::try_from(row)?;

    if tx.status.is_terminal() {
        return Err(LedgerError::AlreadyTerminal {
            id: tx.id,
            status: tx.status,
        });
    }

    let new_holding = match target {
        TransactionStatus::Approved => {
            if tx.crypto_amount <= Decimal::ZERO || tx.usd_value <= Decimal::ZERO {
                return Err(LedgerError::ValidationFailed(format!(
                    "Transaction {} has non-positive amounts",
                    tx.id
                )));
            }

            let current = ledger::lock_holding(conn, &tx.user_id, tx.asset)
                .await
                .map_err(storage_to_approval_failed)?;

            Some(match tx.kind {
                TransactionKind::Deposit => current.deposit(tx.crypto_amount, tx.usd_value)?,
                TransactionKind::Withdrawal => current.withdraw(tx.asset, tx.crypto_amount)?,
            })
        }
        TransactionStatus::Rejected => None,
        TransactionStatus::Pending => {
            return Err(LedgerError::ValidationFailed(
                "Target status must be approved or rejected".to_string(),
            ));
        }
    };

    let now = Utc::now().fixed_offset();

    let result = Transactions::update_many()
        .col_expr(transactions::Column::Status, Expr::value(target.to_string()))
        .col_expr(transactions::Column::ApprovedBy, Expr::value(admin_id.to_string()))
        .col_expr(transactions::Column::ApprovedAt, Expr::value(now))
        .col_expr(transactions::Column::AdminNotes, Expr::value(notes.clone()))
        .filter(transactions::Column::Id.eq(tx.id.as_str()))
        .filter(transactions::Column::Status.eq(TransactionStatus::Pending.to_string()))
        .exec(conn)
        .await
        .map_err(approval_failed)?;

    if result.rows_affected == 0 {
        return Err(lost_race(conn, &tx.id).await);
    }

    if let Some(holding) = new_holding {
        ledger::upsert(
            conn,
            &tx.user_id,
            tx.asset,
            holding.amount,
            holding.average_buy_price,
        )
        .await
        .map_err(storage_to_approval_failed)?;
    }

    tx.status = target;
    tx.approved_by = Some(admin_id.to_string());
    tx.approved_at = Some(now);
    tx.admin_notes = notes;

    Ok(tx)
}

/// Error for a compare-and-swap that matched no row, carrying the status
/// another writer left behind
async fn lost_race<C: ConnectionTrait>(conn: &C, transaction_id: &str) -> LedgerError {
    let current = match Transactions::find_by_id(transaction_id.to_string())
        .one(conn)
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => return LedgerError::NotFound(transaction_id.to_string()),
        Err(e) => return approval_failed(e),
    };

    match Transaction::try_from(current) {
        Ok(tx) => LedgerError::AlreadyTerminal {
            id: tx.id,
            status: tx.status,
        },
        Err(e) => e,
    }
}

fn approval_failed(err: DbErr) -> LedgerError {
    LedgerError::ApprovalFailed(err.to_string())
}

fn storage_to_approval_failed(err: LedgerError) -> LedgerError {
    match err {
        LedgerError::Storage(db_err) => approval_failed(db_err),
        other => other,
    }
}
