//! Agent Memory System
//!
//! Loads prior conversation and relevant long-term memories into an agent's
//! prompt, and writes each finished exchange back to the memory store.

pub mod context_manager;
pub mod normalizer;
pub mod remote;
pub mod retriever;
pub mod store;
pub mod tracker;
pub mod writer;

pub use context_manager::{build_remote_store, build_store, MemoryContextManager};
pub use normalizer::{normalize, MessageKind, MessagePart, RawMessage, StructuredMessage};
pub use remote::HttpMemoryStore;
pub use retriever::{format_memory_context, ContextRetriever};
pub use store::{InMemoryMemoryStore, MemoryStoreClient};
pub use tracker::SessionTracker;
pub use writer::{BatchOutcome, ConversationWriter};
