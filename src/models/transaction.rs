//! Transaction kinds, status machine, and request/response models
//!
//! Status progresses: pending → approved
//!                            ↘ rejected
//! Both outcomes are terminal.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::entities::transactions;
use crate::error::LedgerError;
use crate::models::asset::Asset;
use crate::services::conversion::{round_crypto, round_usd};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "deposit"),
            TransactionKind::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Awaiting admin review
    Pending,
    /// Ledger updated
    Approved,
    /// Declined, ledger untouched
    Rejected,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Approved => write!(f, "approved"),
            TransactionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "approved" => Ok(TransactionStatus::Approved),
            "rejected" => Ok(TransactionStatus::Rejected),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

/// A deposit or withdrawal request, validated from its stored row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub kind: TransactionKind,
    pub asset: Asset,
    pub crypto_amount: Decimal,
    pub usd_value: Decimal,
    pub status: TransactionStatus,
    pub payment_proof_ref: String,
    pub admin_notes: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

impl TryFrom<transactions::Model> for Transaction {
    type Error = LedgerError;

    fn try_from(model: transactions::Model) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, err: String| {
            LedgerError::CorruptRecord(format!("transaction {} {}: {}", model.id, field, err))
        };

        let kind = model.kind.parse().map_err(|e| corrupt("kind", e))?;
        let asset = model.asset.parse().map_err(|e| corrupt("asset", e))?;
        let status = model.status.parse().map_err(|e| corrupt("status", e))?;
        if model.crypto_amount <= Decimal::ZERO {
            return Err(corrupt("crypto_amount", "must be positive".to_string()));
        }
        if model.usd_value <= Decimal::ZERO {
            return Err(corrupt("usd_value", "must be positive".to_string()));
        }
        let crypto_amount = round_crypto(model.crypto_amount);
        let usd_value = round_usd(model.usd_value);

        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            kind,
            asset,
            crypto_amount,
            usd_value,
            status,
            payment_proof_ref: model.payment_proof_ref,
            admin_notes: model.admin_notes,
            approved_by: model.approved_by,
            approved_at: model.approved_at,
            created_at: model.created_at,
        })
    }
}

/// Input to `TransactionService::create`
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub kind: TransactionKind,
    pub asset: Asset,
    pub crypto_amount: Decimal,
    pub usd_value: Decimal,
    /// Proof of payment (deposit) or destination wallet address (withdrawal)
    pub payment_proof_ref: Option<String>,
}

/// POST /api/transactions body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionRequest {
    pub kind: TransactionKind,
    /// Kept as a string so unsupported symbols surface as validation errors
    pub asset: String,
    pub usd_amount: Decimal,
    /// Amount the client computed; checked against the server's conversion
    #[serde(default)]
    pub crypto_amount: Option<Decimal>,
    /// Price the client was quoted; must stay close to the oracle price
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub payment_proof_ref: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

/// POST /api/admin/transactions/transition body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub transaction_id: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionListQuery {
    pub status: Option<TransactionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row() -> transactions::Model {
        transactions::Model {
            id: "tx-1".to_string(),
            user_id: "user-1".to_string(),
            kind: "deposit".to_string(),
            asset: "BTC".to_string(),
            crypto_amount: Decimal::new(2, 2),
            usd_value: Decimal::new(1000, 0),
            status: "pending".to_string(),
            payment_proof_ref: "proofs/user-1/receipt.png".to_string(),
            admin_notes: None,
            approved_by: None,
            approved_at: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_status_terminality() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Approved.is_terminal());
        assert!(TransactionStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Approved,
            TransactionStatus::Rejected,
        ] {
            assert_eq!(status.to_string().parse::<TransactionStatus>(), Ok(status));
        }
        assert!("processing".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_try_from_model() {
        let tx = Transaction::try_from(row()).unwrap();
        assert_eq!(tx.kind, TransactionKind::Deposit);
        assert_eq!(tx.asset, Asset::Btc);
        assert_eq!(tx.crypto_amount.to_string(), "0.02000000");
        assert_eq!(tx.usd_value.to_string(), "1000.00");
        assert_eq!(tx.status, TransactionStatus::Pending);
    }

    #[test]
    fn test_try_from_rejects_unknown_asset() {
        let mut model = row();
        model.asset = "LTC".to_string();
        let err = Transaction::try_from(model).unwrap_err();
        assert!(matches!(err, LedgerError::CorruptRecord(_)));
    }

    #[test]
    fn test_try_from_rejects_non_positive_amount() {
        let mut model = row();
        model.usd_value = Decimal::ZERO;
        assert!(matches!(
            Transaction::try_from(model),
            Err(LedgerError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_transition_request_uses_camel_case() {
        let req: TransitionRequest = serde_json::from_str(
            r#"{"transactionId":"tx-1","status":"rejected","adminNotes":"invalid proof"}"#,
        )
        .unwrap();
        assert_eq!(req.status, TransactionStatus::Rejected);
        assert_eq!(req.admin_notes.as_deref(), Some("invalid proof"));
    }
}
