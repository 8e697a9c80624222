//! # ChurchFlow Worker
//!
//! Delivers SENDING and due SCHEDULED communications.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo run -p churchflow-worker
//! ```
//!
//! Without `WORKER_WEBHOOK_URL` deliveries are only logged. Set
//! `LOG_FORMAT=json` for JSON log lines.

use churchflow_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use churchflow_worker::{
    config::WorkerConfig,
    dispatcher::{Dispatcher, LogDispatcher, WebhookDispatcher},
    orchestrator::Worker,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "churchflow_worker=debug,churchflow_shared=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("ChurchFlow Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::load()?;

    let pool = create_pool(
        DatabaseConfig::from_url(config.database_url.clone())
            .with_max_connections(config.database_max_connections),
    )
    .await?;
    run_migrations(&pool).await?;

    let dispatcher: Arc<dyn Dispatcher> = match config.webhook() {
        Some(url) => {
            tracing::info!(url = %url, "Delivering through webhook");
            Arc::new(WebhookDispatcher::new(url, config.dispatch_timeout())?)
        }
        None => {
            tracing::warn!("WORKER_WEBHOOK_URL not set, deliveries are only logged");
            Arc::new(LogDispatcher::new())
        }
    };

    let worker = Worker::new(pool.clone(), dispatcher, config);
    tokio::spawn(shutdown_on_signal(worker.shutdown_token()));

    worker.run().await?;

    close_pool(pool).await;
    tracing::info!("Worker shut down");
    Ok(())
}

async fn shutdown_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing current batch");
    token.cancel();
}
