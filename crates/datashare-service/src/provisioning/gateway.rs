//! Provisioning gateway trait.

use async_trait::async_trait;

use datashare_core::result::AppResult;
use datashare_entity::provisioning::{ProvisioningDirection, ProvisioningRequest};

/// Accepts provisioning work for items whose state change has already
/// been committed.
///
/// Implementations must not block on the provisioning itself. Outcomes are
/// reported later through
/// [`RequestOrchestrator::on_provisioning_started`](crate::RequestOrchestrator::on_provisioning_started)
/// and
/// [`RequestOrchestrator::on_provisioning_outcome`](crate::RequestOrchestrator::on_provisioning_outcome).
#[async_trait]
pub trait ProvisioningGateway: Send + Sync + std::fmt::Debug {
    /// Hand `requests` to the worker. An error leaves the items in their
    /// `*_Approved` status for a later redispatch.
    async fn dispatch(
        &self,
        direction: ProvisioningDirection,
        requests: Vec<ProvisioningRequest>,
    ) -> AppResult<()>;
}
