//! Transaction records: creation, lookup, and the status transition gate
//!
//! `create` validates and stores a `pending` request. `transition` is the only
//! way out of `pending`; it checks the caller is an admin and hands the
//! decision to the `ApprovalEngine`.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::transactions::{self, Entity as Transactions};
use crate::error::{LedgerError, LedgerResult};
use crate::models::actor::Actor;
use crate::models::asset::Asset;
use crate::models::transaction::{
    NewTransaction, SubmitTransactionRequest, Transaction, TransactionKind, TransactionStatus,
};
use crate::services::approval::ApprovalEngine;
use crate::services::conversion::{
    DepositLimits, check_quoted_price, crypto_from_usd, round_crypto, round_usd,
    verify_conversion,
};
use crate::services::ledger;
use crate::services::price_oracle::PriceFeed;

#[derive(Clone)]
pub struct TransactionService {
    db: DatabaseConnection,
    engine: ApprovalEngine,
    prices: Arc<dyn PriceFeed>,
    limits: DepositLimits,
}

impl TransactionService {
    pub fn new(
        db: DatabaseConnection,
        engine: ApprovalEngine,
        prices: Arc<dyn PriceFeed>,
        limits: DepositLimits,
    ) -> Self {
        Self {
            db,
            engine,
            prices,
            limits,
        }
    }

    /// Convert a user's USD submission and store it as a pending transaction.
    ///
    /// The crypto amount is always computed at the oracle price. A price quoted
    /// by the client must sit within `MAX_QUOTE_DRIFT` of it, and a
    /// client-computed crypto amount must match the server's conversion.
    pub async fn submit(
        &self,
        user_id: &str,
        request: SubmitTransactionRequest,
    ) -> LedgerResult<Transaction> {
        let asset: Asset = request
            .asset
            .parse()
            .map_err(LedgerError::ValidationFailed)?;

        let usd_amount = round_usd(request.usd_amount);
        if usd_amount <= Decimal::ZERO {
            return Err(LedgerError::ValidationFailed(
                "Amount must be greater than 0".to_string(),
            ));
        }

        let quote = self.prices.get_price(asset).await;
        if let Some(quoted) = request.price {
            check_quoted_price(quoted, quote.price, usd_amount, asset)?;
        }

        let crypto_amount = match request.crypto_amount {
            Some(submitted) => verify_conversion(submitted, usd_amount, quote.price, asset)?,
            None => crypto_from_usd(usd_amount, quote.price, asset)?,
        };

        if request.kind == TransactionKind::Deposit {
            self.limits.validate(usd_amount, asset)?;
        }

        let payment_proof_ref = match request.kind {
            TransactionKind::Deposit => request.payment_proof_ref,
            TransactionKind::Withdrawal => request.wallet_address,
        };

        self.create(NewTransaction {
            user_id: user_id.to_string(),
            kind: request.kind,
            asset,
            crypto_amount,
            usd_value: usd_amount,
            payment_proof_ref,
        })
        .await
    }

    /// Validate and persist a new `pending` transaction
    pub async fn create(&self, input: NewTransaction) -> LedgerResult<Transaction> {
        if input.user_id.trim().is_empty() {
            return Err(LedgerError::ValidationFailed(
                "User id is required".to_string(),
            ));
        }

        let crypto_amount = round_crypto(input.crypto_amount);
        let usd_value = round_usd(input.usd_value);
        if crypto_amount <= Decimal::ZERO {
            return Err(LedgerError::ValidationFailed(
                "Crypto amount must be greater than 0".to_string(),
            ));
        }
        if usd_value <= Decimal::ZERO {
            return Err(LedgerError::ValidationFailed(
                "USD value must be greater than 0".to_string(),
            ));
        }

        let payment_proof_ref = input
            .payment_proof_ref
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                LedgerError::ValidationFailed(match input.kind {
                    TransactionKind::Deposit => "Payment proof is required".to_string(),
                    TransactionKind::Withdrawal => "Wallet address is required".to_string(),
                })
            })?;

        if input.kind == TransactionKind::Withdrawal {
            let available = ledger::get(&self.db, &input.user_id, input.asset)
                .await?
                .map(|entry| entry.amount)
                .unwrap_or(Decimal::ZERO);
            if available < crypto_amount {
                return Err(LedgerError::ValidationFailed(format!(
                    "Insufficient {} balance: available {}, requested {}",
                    input.asset, available, crypto_amount
                )));
            }
        }

        let row = transactions::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(input.user_id),
            kind: Set(input.kind.to_string()),
            asset: Set(input.asset.to_string()),
            crypto_amount: Set(crypto_amount),
            usd_value: Set(usd_value),
            status: Set(TransactionStatus::Pending.to_string()),
            payment_proof_ref: Set(payment_proof_ref),
            admin_notes: Set(None),
            approved_by: Set(None),
            approved_at: Set(None),
            created_at: Set(Utc::now().into()),
        };

        let tx = Transaction::try_from(row.insert(&self.db).await?)?;

        tracing::info!(
            transaction_id = %tx.id,
            user_id = %tx.user_id,
            kind = %tx.kind,
            asset = %tx.asset,
            crypto_amount = %tx.crypto_amount,
            usd_value = %tx.usd_value,
            "Transaction submitted"
        );

        Ok(tx)
    }

    /// Move a pending transaction to a terminal status. Admins only.
    pub async fn transition(
        &self,
        actor: &Actor,
        transaction_id: &str,
        target: TransactionStatus,
        notes: Option<String>,
    ) -> LedgerResult<Transaction> {
        if !actor.is_admin() {
            tracing::warn!(
                actor_id = %actor.id,
                transaction_id = %transaction_id,
                "Non-admin attempted a transition"
            );
            return Err(LedgerError::Forbidden(
                "Only admins can review transactions".to_string(),
            ));
        }

        match target {
            TransactionStatus::Approved => {
                self.engine.approve(transaction_id, &actor.id, notes).await
            }
            TransactionStatus::Rejected => {
                self.engine.reject(transaction_id, &actor.id, notes).await
            }
            TransactionStatus::Pending => Err(LedgerError::ValidationFailed(
                "Target status must be approved or rejected".to_string(),
            )),
        }
    }

    /// One transaction, visible to its owner and to admins
    pub async fn get(&self, actor: &Actor, transaction_id: &str) -> LedgerResult<Transaction> {
        let tx = self.find(transaction_id).await?;
        if !actor.is_admin() && tx.user_id != actor.id {
            return Err(LedgerError::NotFound(transaction_id.to_string()));
        }
        Ok(tx)
    }

    pub async fn find(&self, transaction_id: &str) -> LedgerResult<Transaction> {
        Transactions::find_by_id(transaction_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| LedgerError::NotFound(transaction_id.to_string()))
            .and_then(Transaction::try_from)
    }

    /// A user's history, newest first
    pub async fn list_for_user(&self, user_id: &str) -> LedgerResult<Vec<Transaction>> {
        Transactions::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .order_by_desc(transactions::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    /// Admin review queue, oldest first so pending requests are handled in order
    pub async fn list_by_status(
        &self,
        status: Option<TransactionStatus>,
    ) -> LedgerResult<Vec<Transaction>> {
        let mut query = Transactions::find().order_by_asc(transactions::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(transactions::Column::Status.eq(status.to_string()));
        }

        query
            .all(&self.db)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }
}
