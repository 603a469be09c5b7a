//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod logging;
pub mod provisioning;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::database::{DatabaseConfig, StoreBackend};
pub use self::logging::LoggingConfig;
pub use self::provisioning::ProvisioningConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Share store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Provisioning worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// In-flight timeout and redispatch settings.
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `DATASHARE__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DATASHARE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from an inline TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints after deserialization.
    pub fn validate(&self) -> Result<(), AppError> {
        self.worker.validate()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.database.backend, StoreBackend::Postgres);
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.provisioning.in_flight_timeout_seconds, 3600);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            backend = "memory"

            [provisioning]
            redispatch_after_seconds = 10
            reconcile_interval_seconds = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.provisioning.redispatch_after_seconds, 10);
        assert_eq!(
            config.provisioning.reconcile_interval(),
            std::time::Duration::from_secs(1)
        );
    }

    #[test]
    fn test_disabled_worker_is_rejected() {
        let err = AppConfig::from_toml(
            r#"
            [worker]
            enabled = false
            "#,
        )
        .unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
        assert!(err.to_string().contains("without a consumer"));
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        let err = AppConfig::from_toml("[worker]\nqueue_capacity = 0\n").unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
    }
}
