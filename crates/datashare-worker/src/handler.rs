//! Provisioning handler: the platform-specific part of granting and
//! revoking access.

use async_trait::async_trait;
use tracing;

use datashare_core::error::AppError;
use datashare_entity::provisioning::{ProvisioningDirection, ProvisioningRequest};

/// Trait for platform-specific provisioning implementations
#[async_trait]
pub trait ProvisioningHandler: Send + Sync + std::fmt::Debug {
    /// Handler name, for logs
    fn name(&self) -> &str;

    /// Create or tear down access for one item, depending on `request.direction`
    async fn provision(&self, request: &ProvisioningRequest) -> Result<(), ProvisioningError>;
}

/// Error from a provisioning attempt
#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    /// The platform refused the change; do not retry
    #[error("Provisioning rejected: {0}")]
    Rejected(String),

    /// The platform could not be reached; may retry
    #[error("Provisioning unavailable: {0}")]
    Unavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl ProvisioningError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Handler that only logs what it would do.
///
/// Used when no platform integration is configured.
#[derive(Debug, Default, Clone)]
pub struct DryRunHandler;

#[async_trait]
impl ProvisioningHandler for DryRunHandler {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn provision(&self, request: &ProvisioningRequest) -> Result<(), ProvisioningError> {
        let verb = match request.direction {
            ProvisioningDirection::Grant => "grant",
            ProvisioningDirection::Revoke => "revoke",
        };
        tracing::info!(
            "[dry-run] would {} {:?} '{}' of '{}' for '{}'",
            verb,
            request.item_type,
            request.item_uri,
            request.dataset_uri,
            request.principal_uri
        );
        Ok(())
    }
}
