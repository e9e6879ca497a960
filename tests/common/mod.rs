use async_trait::async_trait;
use cryptovest_backend::AppState;
use cryptovest_backend::models::asset::Asset;
use cryptovest_backend::models::notification::NewNotification;
use cryptovest_backend::services::conversion::DepositLimits;
use cryptovest_backend::services::notifier::{DbNotificationSink, NotificationSink};
use cryptovest_backend::services::price_oracle::StaticPriceFeed;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ADMIN_KEY: &str = "test-admin-key";
#[allow(dead_code)]
pub const BTC_PRICE: Decimal = dec!(50000);
#[allow(dead_code)]
pub const ETH_PRICE: Decimal = dec!(3000);

/// Set up a migrated in-memory SQLite database.
/// A single pooled connection keeps every query on the same in-memory database.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Connections in the shared pool; enough for concurrent writers to overlap
const SHARED_POOL_SIZE: u32 = 4;

/// Database reached by several pooled connections at once.
/// Uses TEST_DATABASE_URL when set, otherwise a fresh SQLite file.
#[allow(dead_code)]
pub struct SharedDb {
    pub db: DatabaseConnection,
    sqlite_path: Option<PathBuf>,
}

#[allow(dead_code)]
impl SharedDb {
    pub async fn cleanup(self) {
        let _ = self.db.close().await;
        if let Some(path) = self.sqlite_path {
            let _ = std::fs::remove_file(&path);
            let _ = std::fs::remove_file(path.with_extension("db-wal"));
            let _ = std::fs::remove_file(path.with_extension("db-shm"));
        }
    }
}

#[allow(dead_code)]
pub async fn setup_shared_db() -> Result<SharedDb, DbErr> {
    let (url, sqlite_path) = match env::var("TEST_DATABASE_URL") {
        Ok(url) => (url, None),
        Err(_) => {
            let path = env::temp_dir().join(format!("cryptovest-test-{}.db", uuid::Uuid::new_v4()));
            (format!("sqlite://{}?mode=rwc", path.display()), Some(path))
        }
    };

    let mut options = ConnectOptions::new(url);
    options
        .max_connections(SHARED_POOL_SIZE)
        .min_connections(SHARED_POOL_SIZE)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(SharedDb { db, sqlite_path })
}

/// Captures notifications instead of delivering them
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<NewNotification>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub async fn sent(&self) -> Vec<NewNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(
        &self,
        notification: &NewNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

#[allow(dead_code)]
pub fn test_prices() -> StaticPriceFeed {
    StaticPriceFeed::default()
        .with_price(Asset::Btc, BTC_PRICE)
        .with_price(Asset::Eth, ETH_PRICE)
}

#[allow(dead_code)]
pub struct TestContext {
    pub db: DatabaseConnection,
    pub state: AppState,
    pub notifications: Arc<RecordingSink>,
}

/// App state wired with fixed prices and a recording notifier
#[allow(dead_code)]
pub async fn create_test_context() -> TestContext {
    let db = setup_test_db().await.expect("Failed to set up test DB");
    let notifications = Arc::new(RecordingSink::default());

    let state = AppState::new(
        db.clone(),
        Arc::new(test_prices()),
        notifications.clone(),
        DepositLimits::default(),
        Some(ADMIN_KEY.to_string()),
    );

    TestContext {
        db,
        state,
        notifications,
    }
}

/// Like `create_test_context`, but on a pool with several live connections
#[allow(dead_code)]
pub async fn create_shared_context() -> (TestContext, SharedDb) {
    let shared = setup_shared_db().await.expect("Failed to set up shared test DB");
    let notifications = Arc::new(RecordingSink::default());

    let state = AppState::new(
        shared.db.clone(),
        Arc::new(test_prices()),
        notifications.clone(),
        DepositLimits::default(),
        Some(ADMIN_KEY.to_string()),
    );

    let ctx = TestContext {
        db: shared.db.clone(),
        state,
        notifications,
    };
    (ctx, shared)
}

/// App state that writes notifications to the inbox table
#[allow(dead_code)]
pub async fn create_app_state_with_inbox() -> AppState {
    let db = setup_test_db().await.expect("Failed to set up test DB");

    AppState::new(
        db.clone(),
        Arc::new(test_prices()),
        Arc::new(DbNotificationSink::new(db)),
        DepositLimits::default(),
        Some(ADMIN_KEY.to_string()),
    )
}
