//! Opening the configured share store.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{info, warn};

use datashare_core::config::{DatabaseConfig, StoreBackend};
use datashare_core::error::{AppError, ErrorKind};
use datashare_core::result::AppResult;

use crate::memory::MemoryShareStore;
use crate::repositories::PgShareRepository;
use crate::store::ShareStore;

/// The share store selected by [`DatabaseConfig::backend`], plus the
/// PostgreSQL pool behind it when there is one.
pub struct OpenStore {
    store: Arc<dyn ShareStore>,
    pool: Option<PgPool>,
}

impl std::fmt::Debug for OpenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenStore")
            .field("persistent", &self.pool.is_some())
            .finish()
    }
}

impl OpenStore {
    /// Open the backend named in `config`.
    ///
    /// PostgreSQL stores are migrated before they are handed out.
    pub async fn open(config: &DatabaseConfig) -> AppResult<Self> {
        match config.backend {
            StoreBackend::Memory => {
                warn!("Using in-memory share store; state is lost on exit");
                Ok(Self::memory())
            }
            StoreBackend::Postgres => {
                let pool = connect_postgres(config).await?;
                let repo = PgShareRepository::new(pool.clone());
                repo.migrate().await?;
                Ok(Self {
                    store: Arc::new(repo),
                    pool: Some(pool),
                })
            }
        }
    }

    /// A fresh in-memory store.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(MemoryShareStore::new()),
            pool: None,
        }
    }

    /// The store handle the orchestrator uses.
    pub fn store(&self) -> Arc<dyn ShareStore> {
        Arc::clone(&self.store)
    }

    /// Whether state survives a restart.
    pub fn is_persistent(&self) -> bool {
        self.pool.is_some()
    }

    /// Close the PostgreSQL pool, if any.
    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
            info!("Share store pool closed");
        }
    }
}

/// Parse the connection URL up front so a bad setting is reported as
/// configuration, not as a connection failure.
fn connect_options(config: &DatabaseConfig) -> AppResult<PgConnectOptions> {
    if config.url.trim().is_empty() {
        return Err(AppError::configuration(
            "database.url is required for the postgres backend",
        ));
    }
    PgConnectOptions::from_str(&config.url).map_err(|e| {
        AppError::with_source(
            ErrorKind::Configuration,
            format!("Invalid database.url: {e}"),
            e,
        )
    })
}

async fn connect_postgres(config: &DatabaseConfig) -> AppResult<PgPool> {
    let options = connect_options(config)?;
    info!(
        host = options.get_host(),
        port = options.get_port(),
        database = options.get_database().unwrap_or("(default)"),
        max_connections = config.max_connections,
        "Connecting share store to PostgreSQL"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to connect share store: {e}"),
                e,
            )
        })
}
