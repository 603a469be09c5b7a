//! Outbound port to the provisioning worker.

pub mod gateway;

pub use gateway::ProvisioningGateway;
