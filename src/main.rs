//! Life Insurance Marketplace Server
//!
//! Main server process for the marketplace backend.
//!
//! This binary:
//! - Connects to the `PostgreSQL` document store and ensures the schema
//! - Wires the payment gateway (Stripe, or the mock when no key is set)
//! - Serves the REST API until Ctrl+C
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! # Run server
//! cargo run
//! ```

use lifemart::payments::{MockPaymentGateway, PaymentGateway, StripeGateway};
use lifemart::store::PostgresStore;
use lifemart::{build_router, AppState, Config};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lifemart=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Life Insurance Marketplace Server...");

    // Load configuration
    let config = Config::from_env();
    tracing::info!(postgres = %config.postgres.url, "Configuration loaded");

    // Connect the document store
    let store = Arc::new(PostgresStore::connect(&config.postgres).await?);
    tracing::info!("Document store connected");

    // Wire the payment gateway
    let gateway: Arc<dyn PaymentGateway> = match &config.payment.secret_key {
        Some(secret_key) => {
            let gateway = match &config.payment.api_base {
                Some(api_base) => StripeGateway::with_api_base(secret_key, api_base),
                None => StripeGateway::new(secret_key),
            };
            Arc::new(gateway)
        }
        None => {
            tracing::warn!("PAYMENT_GATEWAY_KEY not set, using the mock payment gateway");
            MockPaymentGateway::shared()
        }
    };

    let state = AppState::new(store, gateway, config.payment.currency.clone());
    let router = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server is running, press Ctrl+C to shutdown");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for the shutdown signal");
    }
}
