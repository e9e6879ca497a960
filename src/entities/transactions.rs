//! SeaORM Entity for the transactions table
//!
//! Deposit/withdrawal requests awaiting or past admin review. Rows are
//! validated at the boundary (see `models::transaction::Transaction`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    /// "deposit" | "withdrawal"
    pub kind: String,
    pub asset: String,
    #[sea_orm(column_type = "Decimal(Some((28, 8)))")]
    pub crypto_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub usd_value: Decimal,
    /// "pending" | "approved" | "rejected"
    pub status: String,
    /// Proof of payment reference (deposit) or destination wallet (withdrawal)
    pub payment_proof_ref: String,
    pub admin_notes: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
