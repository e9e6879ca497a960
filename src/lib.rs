// src/lib.rs

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use services::{
    adjustment::AdjustmentService, approval::ApprovalEngine, conversion::DepositLimits,
    notifier::NotificationSink, price_oracle::PriceFeed, transactions::TransactionService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub prices: Arc<dyn PriceFeed>,
    pub transactions: TransactionService,
    pub adjustments: AdjustmentService,
    pub limits: DepositLimits,
    /// Shared secret required before an `admin` role header is trusted
    pub admin_api_key: Option<String>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        prices: Arc<dyn PriceFeed>,
        notifier: Arc<dyn NotificationSink>,
        limits: DepositLimits,
        admin_api_key: Option<String>,
    ) -> Self {
        let engine = ApprovalEngine::new(db.clone(), notifier.clone());
        let transactions = TransactionService::new(db.clone(), engine, prices.clone(), limits);
        let adjustments = AdjustmentService::new(db.clone(), prices.clone(), notifier);

        Self {
            db,
            prices,
            transactions,
            adjustments,
            limits,
            admin_api_key,
        }
    }
}

pub mod entities {
    pub mod prelude;
    pub mod balances;
    pub mod notifications;
    pub mod transactions;
}

pub mod services {
    pub mod adjustment;
    pub mod approval;
    pub mod conversion;
    pub mod ledger;
    pub mod notifier;
    pub mod price_oracle;
    pub mod transactions;
}

pub mod config;
pub mod error;
pub mod models;
pub mod handlers;
