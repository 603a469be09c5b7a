//! Sharing request entities and their lifecycle rules.

pub mod item_state;
pub mod model;
pub mod object_state;
pub mod role;
pub mod status;

pub use item_state::{ItemAction, ShareItemStateMachine};
pub use model::{ItemType, NewShareItem, ShareAggregate, ShareItem, ShareObject};
pub use object_state::{ShareAction, ShareObjectStateMachine};
pub use role::ShareRole;
pub use status::{ShareItemStatus, ShareObjectStatus};
