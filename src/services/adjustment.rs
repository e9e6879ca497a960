//! Admin manual balance adjustments
//!
//! A USD amount is converted at the live price into a crypto delta and applied
//! through the same locked read-modify-write as an approval. Each adjustment
//! leaves an `approved` transaction behind as its audit record.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::transactions;
use crate::error::{LedgerError, LedgerResult};
use crate::models::actor::Actor;
use crate::models::asset::Asset;
use crate::models::balance::{AdjustBalanceRequest, AdjustBalanceResponse, AdjustmentDirection};
use crate::models::price::PriceSource;
use crate::models::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::services::conversion::{crypto_from_usd, round_usd};
use crate::services::ledger;
use crate::services::notifier::{self, NotificationSink};
use crate::services::price_oracle::PriceFeed;

/// Proof reference recorded on synthetic adjustment transactions
pub const ADJUSTMENT_PROOF_REF: &str = "admin-adjustment";

#[derive(Clone)]
pub struct AdjustmentService {
    db: DatabaseConnection,
    prices: Arc<dyn PriceFeed>,
    notifier: Arc<dyn NotificationSink>,
}

impl AdjustmentService {
    pub fn new(
        db: DatabaseConnection,
        prices: Arc<dyn PriceFeed>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            db,
            prices,
            notifier,
        }
    }

    pub async fn adjust(
        &self,
        actor: &Actor,
        request: AdjustBalanceRequest,
    ) -> LedgerResult<AdjustBalanceResponse> {
        if !actor.is_admin() {
            return Err(LedgerError::Forbidden(
                "Only admins can adjust balances".to_string(),
            ));
        }

        let AdjustBalanceRequest {
            user_id,
            asset,
            direction,
            usd_amount,
            notes,
        } = request;

        if user_id.trim().is_empty() {
            return Err(LedgerError::ValidationFailed(
                "User id is required".to_string(),
            ));
        }
        let asset: Asset = asset
            .parse()
            .map_err(LedgerError::ValidationFailed)?;

        let usd_value = round_usd(usd_amount);
        if usd_value <= Decimal::ZERO {
            return Err(LedgerError::ValidationFailed(
                "Adjustment amount must be greater than 0".to_string(),
            ));
        }

        let quote = self.prices.get_price(asset).await;
        if quote.source != PriceSource::Live {
            tracing::warn!(asset = %asset, "Adjustment refused without a live price");
            return Err(LedgerError::ValidationFailed(format!(
                "Live {} price unavailable",
                asset
            )));
        }
        let crypto_amount = crypto_from_usd(usd_value, quote.price, asset)?;
        if crypto_amount <= Decimal::ZERO {
            return Err(LedgerError::ValidationFailed(format!(
                "${} is less than one unit of {}",
                usd_value, asset
            )));
        }

        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| LedgerError::ApprovalFailed(e.to_string()))?;

        let applied = async {
            let current = ledger::lock_holding(&txn, &user_id, asset).await?;
            let (kind, next) = match direction {
                AdjustmentDirection::Add => (
                    TransactionKind::Deposit,
                    current.deposit(crypto_amount, usd_value)?,
                ),
                AdjustmentDirection::Subtract => (
                    TransactionKind::Withdrawal,
                    current.withdraw(asset, crypto_amount)?,
                ),
            };

            let now = Utc::now().fixed_offset();
            let record = transactions::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                user_id: Set(user_id.clone()),
                kind: Set(kind.to_string()),
                asset: Set(asset.to_string()),
                crypto_amount: Set(crypto_amount),
                usd_value: Set(usd_value),
                status: Set(TransactionStatus::Approved.to_string()),
                payment_proof_ref: Set(ADJUSTMENT_PROOF_REF.to_string()),
                admin_notes: Set(notes.clone()),
                approved_by: Set(Some(actor.id.clone())),
                approved_at: Set(Some(now)),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;

            let balance = ledger::upsert(
                &txn,
                &user_id,
                asset,
                next.amount,
                next.average_buy_price,
            )
            .await?;

            Ok::<_, LedgerError>((Transaction::try_from(record)?, balance))
        }
        .await;

        let (transaction, balance) = match applied {
            Ok(applied) => {
                txn.commit()
                    .await
                    .map_err(|e| LedgerError::ApprovalFailed(e.to_string()))?;
                applied
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!(
                        user_id = %user_id,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                return Err(match e {
                    LedgerError::Storage(db_err) => LedgerError::ApprovalFailed(db_err.to_string()),
                    other => other,
                });
            }
        };

        tracing::info!(
            transaction_id = %transaction.id,
            user_id = %transaction.user_id,
            asset = %asset,
            direction = ?direction,
            crypto_amount = %crypto_amount,
            price = %quote.price,
            admin_id = %actor.id,
            "Balance adjusted"
        );

        notifier::dispatch(
            self.notifier.as_ref(),
            notifier::adjustment_notification(&transaction, direction),
        )
        .await;

        Ok(AdjustBalanceResponse {
            balance,
            transaction,
            price: quote.price,
        })
    }
}
