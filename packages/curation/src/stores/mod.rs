//! Storage implementations.
//!
//! Production deployments implement [`crate::traits::store::ReviewStore`]
//! over their own relational schema; the in-memory store here backs tests
//! and development.

pub mod memory;

pub use memory::MemoryStore;
