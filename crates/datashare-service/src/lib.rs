//! # datashare-service
//!
//! Business logic for share requests. [`RequestOrchestrator`] is the only
//! component that mutates a request: it authorizes the caller, applies the
//! request and item state machines, commits the aggregate, and only then
//! hands provisioning work to the [`ProvisioningGateway`].
//!
//! Services follow constructor injection; all dependencies are provided
//! at construction time via `Arc` references.

pub mod context;
pub mod provisioning;
pub mod share;

pub use context::RequestContext;
pub use provisioning::ProvisioningGateway;
pub use share::{
    ApprovalResult, CallbackDisposition, CreateShareRequest, ItemFilter, RequestOrchestrator,
    RevokeResult, ShareDetail,
};
