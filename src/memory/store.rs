//! Memory store client seam
//!
//! The remote store owns all persisted memory. The core only needs the four
//! calls below; `InMemoryMemoryStore` is a process-local stand-in used for
//! development and tests.

use crate::models::{CanonicalMessage, Memory, MemoryNamespaceId, MemoryRecord, MessageRole, Turn};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Capability required of the memory store
#[async_trait::async_trait]
pub trait MemoryStoreClient: Send + Sync {
    /// Append one ordered event to an actor's session.
    async fn create_event(
        &self,
        memory_id: &MemoryNamespaceId,
        actor_id: &str,
        session_id: &str,
        messages: &[CanonicalMessage],
    ) -> Result<()>;

    /// Records under `namespace` ranked by relevance to `query`, best first.
    async fn retrieve_memories(
        &self,
        memory_id: &MemoryNamespaceId,
        namespace: &str,
        query: &str,
    ) -> Result<Vec<Memory>>;

    /// Up to `k` most recent turns of a session, newest turn first.
    async fn get_last_k_turns(
        &self,
        memory_id: &MemoryNamespaceId,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<Turn>>;

    /// Write independent records into `namespace`.
    async fn store_memories(
        &self,
        memory_id: &MemoryNamespaceId,
        namespace: &str,
        records: &[MemoryRecord],
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredEvent {
    event_id: Uuid,
    created_at: DateTime<Utc>,
    messages: Vec<CanonicalMessage>,
}

/// (memory_id, actor_id, session_id)
type EventKey = (String, String, String);

/// (memory_id, namespace)
type RecordKey = (String, String);

/// Per-operation call counters
#[derive(Debug, Default)]
pub struct StoreCallCounts {
    create_event: AtomicUsize,
    retrieve_memories: AtomicUsize,
    get_last_k_turns: AtomicUsize,
    store_memories: AtomicUsize,
}

impl StoreCallCounts {
    pub fn create_event(&self) -> usize {
        self.create_event.load(Ordering::SeqCst)
    }

    pub fn retrieve_memories(&self) -> usize {
        self.retrieve_memories.load(Ordering::SeqCst)
    }

    pub fn get_last_k_turns(&self) -> usize {
        self.get_last_k_turns.load(Ordering::SeqCst)
    }

    pub fn store_memories(&self) -> usize {
        self.store_memories.load(Ordering::SeqCst)
    }
}

/// In-memory store for development and tests
#[derive(Clone, Default)]
pub struct InMemoryMemoryStore {
    events: Arc<RwLock<HashMap<EventKey, Vec<StoredEvent>>>>,
    records: Arc<RwLock<HashMap<RecordKey, Vec<Memory>>>>,
    calls: Arc<StoreCallCounts>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &StoreCallCounts {
        &self.calls
    }

    /// Seed a long-term memory directly, bypassing the write path.
    pub async fn insert_memory(
        &self,
        memory_id: &MemoryNamespaceId,
        namespace: &str,
        memory: Memory,
    ) {
        let mut records = self.records.write().await;
        records
            .entry((memory_id.to_string(), namespace.to_string()))
            .or_insert_with(Vec::new)
            .push(memory);
    }

    /// Events of a session in write order.
    pub async fn events(
        &self,
        memory_id: &MemoryNamespaceId,
        actor_id: &str,
        session_id: &str,
    ) -> Vec<Vec<CanonicalMessage>> {
        let key = (
            memory_id.to_string(),
            actor_id.to_string(),
            session_id.to_string(),
        );
        let events = self.events.read().await;
        events
            .get(&key)
            .map(|list| list.iter().map(|e| e.messages.clone()).collect())
            .unwrap_or_default()
    }

    /// Records stored under exactly `namespace`.
    pub async fn records(&self, memory_id: &MemoryNamespaceId, namespace: &str) -> Vec<Memory> {
        let records = self.records.read().await;
        records
            .get(&(memory_id.to_string(), namespace.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MemoryStoreClient for InMemoryMemoryStore {
    async fn create_event(
        &self,
        memory_id: &MemoryNamespaceId,
        actor_id: &str,
        session_id: &str,
        messages: &[CanonicalMessage],
    ) -> Result<()> {
        self.calls.create_event.fetch_add(1, Ordering::SeqCst);

        let event = StoredEvent {
            event_id: Uuid::new_v4(),
            created_at: Utc::now(),
            messages: messages.to_vec(),
        };

        debug!(
            event_id = %event.event_id,
            created_at = %event.created_at,
            actor_id,
            session_id,
            "Stored event with {} messages",
            event.messages.len()
        );

        let mut events = self.events.write().await;
        events
            .entry((
                memory_id.to_string(),
                actor_id.to_string(),
                session_id.to_string(),
            ))
            .or_insert_with(Vec::new)
            .push(event);

        Ok(())
    }

    async fn retrieve_memories(
        &self,
        memory_id: &MemoryNamespaceId,
        namespace: &str,
        query: &str,
    ) -> Result<Vec<Memory>> {
        self.calls.retrieve_memories.fetch_add(1, Ordering::SeqCst);

        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.records.read().await;
        let mut ranked: Vec<Memory> = records
            .iter()
            .filter(|((mem, ns), _)| mem == memory_id.as_str() && ns.starts_with(namespace))
            .flat_map(|(_, list)| list.iter())
            .filter_map(|memory| {
                let score = relevance(&terms, &memory.content);
                (score > 0.0).then(|| Memory {
                    score: Some(score),
                    ..memory.clone()
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(ranked)
    }

    async fn get_last_k_turns(
        &self,
        memory_id: &MemoryNamespaceId,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<Turn>> {
        self.calls.get_last_k_turns.fetch_add(1, Ordering::SeqCst);

        let messages: Vec<CanonicalMessage> = self
            .events(memory_id, actor_id, session_id)
            .await
            .into_iter()
            .flatten()
            .collect();

        let mut turns = group_into_turns(messages);
        turns.reverse();
        turns.truncate(k);
        Ok(turns)
    }

    async fn store_memories(
        &self,
        memory_id: &MemoryNamespaceId,
        namespace: &str,
        new_records: &[MemoryRecord],
    ) -> Result<()> {
        self.calls.store_memories.fetch_add(1, Ordering::SeqCst);

        let mut records = self.records.write().await;
        let list = records
            .entry((memory_id.to_string(), namespace.to_string()))
            .or_insert_with(Vec::new);

        list.extend(new_records.iter().map(|r| Memory {
            content: r.content.clone(),
            metadata: r.metadata.clone(),
            score: None,
        }));

        Ok(())
    }
}

/// Split a session's messages into turns; each USER message opens a new turn.
fn group_into_turns(messages: Vec<CanonicalMessage>) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();

    for message in messages {
        let opens_turn = message.role == MessageRole::User || turns.is_empty();
        if opens_turn {
            turns.push(vec![message]);
        } else if let Some(current) = turns.last_mut() {
            current.push(message);
        }
    }

    turns
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Fraction of query terms that appear in `content`.
fn relevance(terms: &[String], content: &str) -> f64 {
    let content_terms = tokenize(content);
    let hits = terms
        .iter()
        .filter(|term| content_terms.iter().any(|c| c == *term || c.starts_with(term.as_str())))
        .count();
    hits as f64 / terms.len() as f64
}
