//! Error taxonomy for the ledger workflow
//!
//! Every variant leaves the ledger and the transaction in a well-defined state;
//! handlers map them to HTTP responses in `handlers::map_ledger_error`.

use rust_decimal::Decimal;
use sea_orm::DbErr;

use crate::models::asset::Asset;
use crate::models::transaction::TransactionStatus;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed input; nothing was written
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Submitted crypto amount disagrees with the recomputed conversion
    #[error("Conversion mismatch: submitted {submitted}, expected {expected}")]
    ConversionMismatch { submitted: Decimal, expected: Decimal },

    #[error("Transaction {0} not found")]
    NotFound(String),

    /// Transaction already left `pending`
    #[error("Transaction {id} is already {status}")]
    AlreadyTerminal { id: String, status: TransactionStatus },

    #[error("Insufficient {asset} balance: available {available}, requested {requested}")]
    InsufficientBalance {
        asset: Asset,
        available: Decimal,
        requested: Decimal,
    },

    /// The atomic ledger + status write failed; the transaction is still pending
    #[error("Approval failed: {0}")]
    ApprovalFailed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A stored row failed validation when read back
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbErr),
}

impl LedgerError {
    /// Stable code for programmatic handling by clients
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::ValidationFailed(_) => "VALIDATION_FAILED",
            LedgerError::ConversionMismatch { .. } => "CONVERSION_MISMATCH",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::AlreadyTerminal { .. } => "ALREADY_TERMINAL",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::ApprovalFailed(_) => "APPROVAL_FAILED",
            LedgerError::Forbidden(_) => "FORBIDDEN",
            LedgerError::CorruptRecord(_) => "CORRUPT_RECORD",
            LedgerError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ApprovalFailed(_) | LedgerError::Storage(_))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
