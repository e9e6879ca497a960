//! Balance ledger: per-user, per-asset holdings with average cost basis
//!
//! Reads are public. Writes go through `upsert`, which is crate-private and
//! only called by the approval engine and the admin adjustment path, always
//! with absolute values so retries cannot double count.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};

use crate::entities::balances::{self, Entity as Balances};
use crate::error::{LedgerError, LedgerResult};
use crate::models::asset::Asset;
use crate::models::balance::BalanceEntry;
use crate::services::conversion::round_crypto;

/// Cost basis decimals
const AVERAGE_PRICE_DECIMALS: u32 = 8;

/// Quantity and cost basis of one holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Holding {
    pub amount: Decimal,
    pub average_buy_price: Decimal,
}

impl Holding {
    pub fn new(amount: Decimal, average_buy_price: Decimal) -> Self {
        Self {
            amount,
            average_buy_price,
        }
    }

    /// Blend an incoming purchase into the holding (weighted-average cost).
    ///
    /// The purchase price is `usd_value / crypto_amount`.
    pub fn deposit(&self, crypto_amount: Decimal, usd_value: Decimal) -> LedgerResult<Holding> {
        if crypto_amount <= Decimal::ZERO {
            return Err(LedgerError::ValidationFailed(
                "Deposit amount must be greater than 0".to_string(),
            ));
        }
        if usd_value.is_sign_negative() {
            return Err(LedgerError::ValidationFailed(
                "Deposit value cannot be negative".to_string(),
            ));
        }

        let overflow = || LedgerError::ValidationFailed("Balance arithmetic overflowed".to_string());

        let deposit_price = usd_value.checked_div(crypto_amount).ok_or_else(overflow)?;
        let new_amount = self.amount.checked_add(crypto_amount).ok_or_else(overflow)?;
        let existing_value = self
            .amount
            .checked_mul(self.average_buy_price)
            .ok_or_else(overflow)?;
        let incoming_value = crypto_amount.checked_mul(deposit_price).ok_or_else(overflow)?;
        let new_average = existing_value
            .checked_add(incoming_value)
            .and_then(|total| total.checked_div(new_amount))
            .ok_or_else(overflow)?
            .round_dp_with_strategy(AVERAGE_PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero);

        Ok(Holding {
            amount: round_crypto(new_amount),
            average_buy_price: new_average,
        })
    }

    /// Remove `crypto_amount` from the holding; cost basis is unchanged.
    ///
    /// Fails closed when the holding cannot cover the amount.
    pub fn withdraw(&self, asset: Asset, crypto_amount: Decimal) -> LedgerResult<Holding> {
        if crypto_amount <= Decimal::ZERO {
            return Err(LedgerError::ValidationFailed(
                "Withdrawal amount must be greater than 0".to_string(),
            ));
        }
        if self.amount < crypto_amount {
            return Err(LedgerError::InsufficientBalance {
                asset,
                available: self.amount,
                requested: crypto_amount,
            });
        }

        Ok(Holding {
            amount: round_crypto(self.amount - crypto_amount),
            average_buy_price: self.average_buy_price,
        })
    }
}

impl From<&BalanceEntry> for Holding {
    fn from(entry: &BalanceEntry) -> Self {
        Holding::new(entry.amount, entry.average_buy_price)
    }
}

/// Current ledger row for (user, asset), if any
pub async fn get<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    asset: Asset,
) -> LedgerResult<Option<BalanceEntry>> {
    Balances::find_by_id((user_id.to_string(), asset.to_string()))
        .one(conn)
        .await?
        .map(BalanceEntry::try_from)
        .transpose()
}

/// All ledger rows for a user, ordered by asset
pub async fn list_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> LedgerResult<Vec<BalanceEntry>> {
    Balances::find()
        .filter(balances::Column::UserId.eq(user_id))
        .order_by_asc(balances::Column::Asset)
        .all(conn)
        .await?
        .into_iter()
        .map(BalanceEntry::try_from)
        .collect()
}

/// Read the holding for (user, asset) under an exclusive row lock.
///
/// A zero row is inserted first when none exists so concurrent writers for a
/// brand-new pair serialize on the same row. Must run inside a transaction;
/// the zero row disappears again if the caller rolls back.
pub(crate) async fn lock_holding<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    asset: Asset,
) -> LedgerResult<Holding> {
    let zero = balances::ActiveModel {
        user_id: Set(user_id.to_string()),
        asset: Set(asset.to_string()),
        amount: Set(Decimal::ZERO),
        average_buy_price: Set(Decimal::ZERO),
        updated_at: Set(Utc::now().into()),
    };
    Balances::insert(zero)
        .on_conflict(
            OnConflict::columns([balances::Column::UserId, balances::Column::Asset])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    let row = Balances::find_by_id((user_id.to_string(), asset.to_string()))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| {
            LedgerError::CorruptRecord(format!("balance {}/{} vanished under lock", user_id, asset))
        })?;

    Ok(Holding::from(&BalanceEntry::try_from(row)?))
}

/// Write the absolute holding for (user, asset).
///
/// Keyed on the composite key; calling it twice with the same values leaves
/// the same final state.
pub(crate) async fn upsert<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    asset: Asset,
    amount: Decimal,
    average_buy_price: Decimal,
) -> LedgerResult<BalanceEntry> {
    if amount.is_sign_negative() || average_buy_price.is_sign_negative() {
        return Err(LedgerError::ValidationFailed(format!(
            "Balance for {} cannot be negative",
            asset
        )));
    }

    let amount = round_crypto(amount);
    let updated_at = Utc::now();

    let row = balances::ActiveModel {
        user_id: Set(user_id.to_string()),
        asset: Set(asset.to_string()),
        amount: Set(amount),
        average_buy_price: Set(average_buy_price),
        updated_at: Set(updated_at.into()),
    };

    Balances::insert(row)
        .on_conflict(
            OnConflict::columns([balances::Column::UserId, balances::Column::Asset])
                .update_columns([
                    balances::Column::Amount,
                    balances::Column::AverageBuyPrice,
                    balances::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    tracing::debug!(
        user_id = %user_id,
        asset = %asset,
        amount = %amount,
        average_buy_price = %average_buy_price,
        "Balance upserted"
    );

    Ok(BalanceEntry {
        user_id: user_id.to_string(),
        asset,
        amount,
        average_buy_price,
        updated_at: updated_at.into(),
    })
}
