//! # datashare-auth
//!
//! Authorization for share request operations. The caller's role is
//! resolved elsewhere; this crate only answers "may this role perform this
//! operation right now".
//!
//! ## Modules
//!
//! - `guard`: capability table and the [`PermissionGuard`] that enforces it

pub mod guard;

pub use guard::{CapabilityTable, PermissionGuard, ShareOperation};
