//! # datashare-database
//!
//! Persistence for share aggregates. [`ShareStore`] is the seam the
//! orchestrator talks to; [`PgShareRepository`] backs it with PostgreSQL
//! and [`MemoryShareStore`] keeps everything in process.

pub mod backend;
pub mod memory;
pub mod repositories;
pub mod store;

pub use backend::OpenStore;
pub use memory::MemoryShareStore;
pub use repositories::PgShareRepository;
pub use store::ShareStore;
