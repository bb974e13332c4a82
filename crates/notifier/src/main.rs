//! RentLedger Notifier
//!
//! Runs the overdue-balance dispatch on a fixed interval:
//! 1. Lists every user in the store
//! 2. Pushes a summary of overdue tenants to each user's devices
//! 3. Prunes device tokens the push service rejects for good

mod runner;

use crate::runner::NotifierRunner;
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use rentledger_common::{
    config::AppConfig,
    db,
    metrics,
    push::create_push_sender,
    VERSION,
};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();

    info!("Starting RentLedger Notifier v{}", VERSION);

    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .with_http_listener(addr)
            .install()?;
        metrics::register_metrics();
        info!("Metrics listening on {}", addr);
    }

    info!(backend = ?config.store.backend, "Connecting to document store...");
    let store = db::connect(&config.store).await?;

    let push = create_push_sender(&config.push)?;
    info!(provider = push.provider_name(), "Push sender initialized");

    let runner = NotifierRunner::new(store, push, config.push.link.clone());

    let interval = config.notifier_interval();
    info!(
        interval_secs = interval.as_secs(),
        run_on_start = config.notifier.run_on_start,
        "Notifier ready"
    );

    runner
        .run(interval, config.notifier.run_on_start, shutdown_signal())
        .await;

    info!("Notifier shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Shutdown signal received"),
        _ = terminate => info!("SIGTERM received"),
    }
}
