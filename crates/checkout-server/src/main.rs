//! Deal Checkout HTTP Server
//!
//! Axum server hosting one checkout session per deal: shipping, add-ons and
//! invoices, then payment by card, wallet or cheque.

mod config;
mod handlers;
mod routes;
mod session;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::{AnalyticsSink, MemorySelectionStore, PricingEngine, SystemClock, TracingAnalytics};
use checkout_payments::{CheckoutBackend, ClientSideGateway, HttpAnalytics, HttpBackend, MockBackend, Submitter};

use crate::config::ServerConfig;
use crate::session::SessionRegistry;
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

    let config = ServerConfig::from_env();

    // Backend
    let http_backend = HttpBackend::from_env();
    let mock_backend = http_backend.is_err();
    let backend: Arc<dyn CheckoutBackend> = match http_backend {
        Ok(backend) => {
            tracing::info!(base_url = %backend.config().base_url, "✓ Backend API configured");
            Arc::new(backend)
        }
        Err(e) => {
            tracing::warn!("⚠ Backend API not configured ({e}) - serving the demo deal");
            tracing::warn!("  Set CHECKOUT_API_BASE_URL in .env");
            Arc::new(MockBackend::with_demo_deal())
        }
    };

    // Analytics
    let analytics: Arc<dyn AnalyticsSink> = match HttpAnalytics::from_env() {
        Ok(analytics) => {
            tracing::info!("✓ Analytics capture configured");
            Arc::new(analytics)
        }
        Err(_) => {
            tracing::info!("Analytics capture not configured - events go to the log");
            Arc::new(TracingAnalytics)
        }
    };

    tracing::info!(
        domestic = %config.fees.domestic_rate,
        international = %config.fees.international_rate,
        "Processing fee rates"
    );

    // Build application state
    let state = AppState {
        submitter: Submitter::new(backend.clone(), Arc::new(ClientSideGateway), analytics.clone()),
        backend,
        engine: Arc::new(PricingEngine::new(config.fees.clone())),
        analytics,
        clock: Arc::new(SystemClock),
        selections: Arc::new(MemorySelectionStore::new()),
        sessions: Arc::new(SessionRegistry::new()),
        mock_backend,
    };

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 checkout server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET   /health                              - Health check");
    tracing::info!("  GET   /checkout/{{deal_id}}?step=           - Open checkout");
    tracing::info!("  PATCH /checkout/{{deal_id}}/sections/{{name}} - Update a section");
    tracing::info!("  POST  /checkout/{{deal_id}}/step             - Go to step");
    tracing::info!("  POST  /checkout/{{deal_id}}/address          - Save shipping address");
    tracing::info!("  POST  /checkout/{{deal_id}}/pay              - Card or cheque payment");
    tracing::info!("  POST  /checkout/{{deal_id}}/wallet           - Wallet token");
    tracing::info!("  GET   /orders/{{order_id}}?deal_id=          - Order confirmation");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
