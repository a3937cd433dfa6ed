//! Crowdfund Ledger API server.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crowdfund_ledger::adapters::http::{app_router, AppState, HttpSettings};
use crowdfund_ledger::adapters::{
    LoggingNotificationSink, PostgresLedgerStore, PostgresWebhookEventRepository,
    StripePaymentGateway, TimeoutPaymentGateway,
};
use crowdfund_ledger::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let pool = config.database.connect().await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let ledger = Arc::new(PostgresLedgerStore::new(pool.clone()));
    let gateway = TimeoutPaymentGateway::new(
        StripePaymentGateway::new(config.payment.stripe_config()),
        config.payment.gateway_timeout(),
    );

    let state = AppState {
        ledger: ledger.clone(),
        projects: ledger,
        gateway: Arc::new(gateway),
        notifier: Arc::new(LoggingNotificationSink::new()),
        webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool)),
        policy: config.donation.policy()?,
    };

    let settings = HttpSettings {
        cors_origins: config.server.cors_origins_list(),
        request_timeout: config.server.request_timeout(),
        trusted_proxy_secret: config.server.trusted_proxy_secret().map(str::to_string),
    };
    if settings.trusted_proxy_secret.is_none() {
        tracing::warn!("No trusted proxy secret configured; identity headers are taken as sent");
    }
    let app = app_router(state, &settings);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %addr,
        environment = ?config.server.environment,
        stripe_test_mode = config.payment.is_test_mode(),
        "Crowdfund ledger listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if server.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
