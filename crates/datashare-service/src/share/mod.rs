//! Share request orchestration.

pub mod fanout;
pub mod locks;
pub mod orchestrator;
pub mod view;

pub use fanout::{FanOut, ItemTransition};
pub use locks::ShareLocks;
pub use orchestrator::RequestOrchestrator;
pub use view::{
    ApprovalResult, CallbackDisposition, CreateShareRequest, ItemFilter, RevokeResult,
    ShareDetail,
};
