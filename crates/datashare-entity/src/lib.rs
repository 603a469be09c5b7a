//! # datashare-entity
//!
//! Domain entity models for DataShare. `ShareObject` and `ShareItem` map
//! to database rows and derive `sqlx::FromRow`; the state machines in
//! [`share::object_state`] and [`share::item_state`] are pure functions
//! over the status enums and never touch storage.

pub mod provisioning;
pub mod share;
