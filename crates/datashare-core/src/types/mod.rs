//! Shared value types used across crates.

pub mod id;
pub mod pagination;

pub use id::{ShareItemId, ShareObjectId};
pub use pagination::{PageRequest, PageResponse};
