//! DataShare server: share request lifecycle and provisioning.
//!
//! Main entry point that wires all crates together and runs until a
//! shutdown signal arrives.

use std::sync::Arc;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use datashare_core::config::AppConfig;
use datashare_core::error::AppError;
use datashare_database::OpenStore;
use datashare_service::RequestOrchestrator;
use datashare_worker::{
    DryRunHandler, ProvisioningQueue, ProvisioningRunner, ReconcileScheduler, Reconciler,
};

#[tokio::main]
async fn main() {
    let env = std::env::var("DATASHARE_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!("Loaded configuration (env: {})", env);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting DataShare v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Share store ──────────────────────────────────────
    let store = OpenStore::open(&config.database).await?;

    // ── Step 2: Provisioning queue + orchestrator ────────────────
    let (queue, receiver) = ProvisioningQueue::channel(config.worker.queue_capacity);
    let orchestrator = Arc::new(RequestOrchestrator::new(
        store.store(),
        Arc::new(queue),
    ));

    // ── Step 3: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 4: Provisioning worker ──────────────────────────────
    let worker_handle = {
        let worker_id = format!("worker-{}", std::process::id());
        let runner = ProvisioningRunner::new(
            Arc::clone(&orchestrator),
            Arc::new(DryRunHandler),
            config.worker.clone(),
            worker_id,
        );
        let worker_cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            runner.run(receiver, worker_cancel).await;
        });

        tracing::info!("Provisioning worker started");
        handle
    };

    // ── Step 5: Reconciler ───────────────────────────────────────
    let mut scheduler = if config.provisioning.reconcile_enabled {
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&orchestrator),
            config.provisioning.clone(),
        ));
        let scheduler = ReconcileScheduler::new(reconciler, &config.provisioning).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Provisioning reconciliation disabled");
        None
    };

    tracing::info!("DataShare ready");

    // ── Step 6: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }

    let grace = config.worker.shutdown_grace() + std::time::Duration::from_secs(1);
    if tokio::time::timeout(grace, worker_handle).await.is_err() {
        tracing::warn!("Provisioning worker did not stop within {}s", grace.as_secs());
    }

    store.close().await;

    tracing::info!("DataShare shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
