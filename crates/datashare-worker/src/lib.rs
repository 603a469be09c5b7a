//! Provisioning worker and reconciliation for DataShare.
//!
//! This crate provides:
//! - A bounded in-process queue that implements the provisioning gateway
//! - A handler trait for the platform-specific grant/revoke mechanics
//! - A runner that drains the queue with bounded concurrency and reports
//!   outcomes back to the orchestrator
//! - A reconciler, run on a repeating schedule, that fails timed-out items
//!   and retries stuck dispatches

pub mod handler;
pub mod queue;
pub mod reconciler;
pub mod runner;
pub mod scheduler;

pub use handler::{DryRunHandler, ProvisioningError, ProvisioningHandler};
pub use queue::ProvisioningQueue;
pub use reconciler::{ReconcileReport, Reconciler};
pub use runner::ProvisioningRunner;
pub use scheduler::ReconcileScheduler;
