//! lesson-booking HTTP Server
//!
//! Axum-based server exposing the lesson catalog, checkout, instructor
//! onboarding and the payment provider webhook.

mod auth;
mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Context;
use lesson_core::{LessonStore, MemoryStore, PgStore, Store};
use lesson_payments::{PaymentProvider, StripeClient, WebhookVerifier};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "Configuration loaded");

    // Storage
    let store: Arc<dyn Store> = match config.pg_config() {
        Some(pg) => {
            let store = PgStore::connect(&pg)
                .await
                .context("failed to connect to database")?;
            store.migrate().await.context("failed to run migrations")?;
            tracing::info!(max_connections = pg.max_connections, "✓ Connected to PostgreSQL");
            Arc::new(store)
        }
        None => {
            tracing::warn!("⚠ DATABASE_URL not set - using in-memory store, data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    // Payments
    let provider: Arc<dyn PaymentProvider> = Arc::new(
        StripeClient::new(&config.stripe_secret_key, &config.stripe_account_country)
            .context("invalid Stripe configuration")?,
    );
    let verifier = WebhookVerifier::new(config.stripe_webhook_secret.as_str())
        .context("invalid webhook secret")?
        .with_tolerance(config.webhook_tolerance_secs);
    if !config.strict {
        tracing::warn!("⚠ Non-strict mode - lessons of instructors without a payment account can be sold");
    }

    let state = AppState::new(store.clone(), provider, verifier, config.checkout_settings());
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 lesson-booking server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                       - Health check");
    tracing::info!("  GET  /api/auth/me                  - Current instructor");
    tracing::info!("  POST /api/auth/onboarding          - Start payout onboarding");
    tracing::info!("  GET  /api/instructors/{{id}}         - Public instructor profile");
    tracing::info!("  GET  /api/lessons                  - List lessons");
    tracing::info!("  POST /api/lessons                  - Create lesson");
    tracing::info!("  POST /api/checkout/session         - Create checkout");
    tracing::info!("  GET  /api/checkout/session/{{id}}    - Checkout payment state");
    tracing::info!("  GET  /api/stripe/connect/refresh   - New onboarding link");
    tracing::info!("  GET  /api/stripe/connect/status    - Onboarding state");
    tracing::info!("  POST /api/webhooks/stripe          - Payment webhook");
    tracing::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, closing {} store", store.backend());
    store.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
