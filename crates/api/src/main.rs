//! RentLedger API
//!
//! The HTTP entry point for landlords' clients and the notification
//! scheduler. Handles:
//! - Authentication of bearer tokens into a `Caller`
//! - Rate limiting
//! - Request routing to the ledger workflows
//! - Observability (logging, metrics)

mod handlers;
mod middleware;
mod router;

use anyhow::Context;
use axum::{extract::FromRef, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rentledger_common::{
    auth::JwtManager,
    config::{AppConfig, ObservabilityConfig},
    db::{self, SharedStore},
    metrics,
    push::{create_push_sender, PushSender},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub jwt: Arc<JwtManager>,
    pub push: Arc<dyn PushSender>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.observability);
    info!("Starting RentLedger API v{}", rentledger_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    let prometheus = PrometheusBuilder::new()
        .set_buckets(metrics::LATENCY_BUCKETS)?
        .install_recorder()?;
    metrics::register_metrics();

    // Initialize document store
    info!(backend = ?config.store.backend, "Connecting to document store...");
    let store = db::connect(&config.store).await?;

    let secret = config
        .auth
        .jwt_secret
        .clone()
        .context("auth.jwt_secret must be set")?;
    let jwt = Arc::new(JwtManager::new(&secret, config.auth.jwt_expiration_secs));

    let push = create_push_sender(&config.push)?;
    info!(provider = push.provider_name(), "Push sender initialized");

    // Create app state
    let state = AppState {
        config: config.clone(),
        store,
        jwt,
        push,
    };

    if config.observability.metrics_port > 0 {
        spawn_metrics_server(config.observability.metrics_port, prometheus).await?;
    }

    // Build the router
    let app = router::create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Serve the Prometheus exposition on its own port
async fn spawn_metrics_server(port: u16, handle: PrometheusHandle) -> anyhow::Result<()> {
    let app = Router::new().route("/metrics", get(move || async move { handle.render() }));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics server stopped");
        }
    });
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
