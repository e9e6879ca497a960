use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cryptovest_backend::AppState;
use cryptovest_backend::config::AppConfig;
use cryptovest_backend::handlers;
use cryptovest_backend::services::notifier::{
    DbNotificationSink, EmailRelaySink, FanoutSink, NotificationSink,
};
use cryptovest_backend::services::price_oracle::{CoinGeckoPriceOracle, PriceFeed};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cryptovest_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().expect("Invalid configuration");

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let prices: Arc<dyn PriceFeed> = Arc::new(CoinGeckoPriceOracle::new(
        config.coingecko_base_url.clone(),
        config.coingecko_api_key.clone(),
        config.price_cache_ttl_secs,
    ));

    let mut sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(DbNotificationSink::new(db.clone()))];
    if let Some(relay_url) = &config.email_relay_url {
        tracing::info!("E-mail notifications enabled via {}", relay_url);
        sinks.push(Arc::new(EmailRelaySink::new(relay_url.clone())));
    }
    let notifier: Arc<dyn NotificationSink> = Arc::new(FanoutSink::new(sinks));

    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not configured, admin endpoints are disabled");
    }

    let state = AppState::new(
        db,
        prices,
        notifier,
        config.deposit_limits,
        config.admin_api_key.clone(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap();

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
