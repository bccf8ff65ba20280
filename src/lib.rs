//! Agent Memory Context
//!
//! Shared memory layer for conversational agent frameworks backed by a
//! remote memory store:
//! - Loads a session's recent conversation once per process
//! - Retrieves long-term memories relevant to the current input
//! - Normalizes framework-native messages into (text, role) pairs
//! - Persists exchanges, message batches, and semantic facts
//!
//! Memory is an enhancement, never a dependency: store failures degrade to
//! "no context" on reads and `false` on writes.
//!
//! TURN LOOP:
//! get_context → (adapter runs its agent) → store_*

pub mod api;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;

pub use error::{MemoryError, Result};

// Re-export common types
pub use config::{ConfigLoader, ManagerSettings};
pub use memory::{MemoryContextManager, MemoryStoreClient, RawMessage};
pub use models::*;
