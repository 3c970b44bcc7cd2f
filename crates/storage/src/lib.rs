//! Durable session-snapshot storage.
//!
//! The scheduler persists a snapshot after every status transition so that
//! `status` can be answered from any call path, including a process that
//! did not run the session.

mod json_store;
mod memory_store;
mod trait_;

pub use json_store::JsonSessionStore;
pub use memory_store::MemorySessionStore;
pub use trait_::{Result, SessionStore, StorageError};
