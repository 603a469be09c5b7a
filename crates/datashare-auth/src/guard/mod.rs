//! Role capability checks for share request operations.

pub mod enforcer;
pub mod policies;

pub use enforcer::PermissionGuard;
pub use policies::{CapabilityTable, ShareOperation};
