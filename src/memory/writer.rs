//! Conversation persistence
//!
//! Three write paths, each reporting success as a bool. A memory outage is
//! logged and absorbed so it never blocks the user-facing response.

use crate::memory::normalizer::{normalize, RawMessage};
use crate::memory::store::MemoryStoreClient;
use crate::models::{
    actor_namespace, CanonicalMessage, MemoryNamespaceId, MemoryRecord, SEMANTIC_FACT_TYPE,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of persisting one framework batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub stored: bool,
    pub normalized: usize,
}

pub struct ConversationWriter {
    store: Arc<dyn MemoryStoreClient>,
    memory_id: MemoryNamespaceId,
}

impl ConversationWriter {
    pub fn new(store: Arc<dyn MemoryStoreClient>, memory_id: MemoryNamespaceId) -> Self {
        Self { store, memory_id }
    }

    /// Persist one user/response exchange as a single event.
    pub async fn store_conversation(
        &self,
        user_input: &str,
        response: &str,
        actor_id: &str,
        session_id: &str,
    ) -> bool {
        if user_input.is_empty() || response.is_empty() {
            warn!("Cannot store conversation: missing user_input or response");
            return false;
        }

        debug!("Storing conversation for {}:{}", actor_id, session_id);

        let exchange = [
            CanonicalMessage::user(user_input),
            CanonicalMessage::assistant(response),
        ];

        match self
            .store
            .create_event(&self.memory_id, actor_id, session_id, &exchange)
            .await
        {
            Ok(()) => {
                info!("Successfully stored conversation in memory");
                true
            }
            Err(e) => {
                error!("Failed to store conversation in memory: {}", e);
                false
            }
        }
    }

    /// Normalize a framework batch and persist it, in order, as one event.
    pub async fn store_messages(
        &self,
        raw_messages: &[RawMessage],
        actor_id: &str,
        session_id: &str,
    ) -> bool {
        self.store_batch(raw_messages, actor_id, session_id).await.stored
    }

    /// Like `store_messages`, also reporting how many messages survived
    /// normalization.
    pub async fn store_batch(
        &self,
        raw_messages: &[RawMessage],
        actor_id: &str,
        session_id: &str,
    ) -> BatchOutcome {
        if raw_messages.is_empty() {
            return BatchOutcome {
                stored: true,
                normalized: 0,
            };
        }

        debug!(
            "Storing {} new messages for {}:{}",
            raw_messages.len(),
            actor_id,
            session_id
        );

        let messages = normalize(raw_messages);
        BatchOutcome {
            stored: self.store_normalized(&messages, actor_id, session_id).await,
            normalized: messages.len(),
        }
    }

    /// Persist already-normalized messages as one event.
    pub async fn store_normalized(
        &self,
        messages: &[CanonicalMessage],
        actor_id: &str,
        session_id: &str,
    ) -> bool {
        if messages.is_empty() {
            warn!("No messages were converted for storage");
            return false;
        }

        match self
            .store
            .create_event(&self.memory_id, actor_id, session_id, messages)
            .await
        {
            Ok(()) => {
                info!("Successfully stored {} messages in memory", messages.len());
                true
            }
            Err(e) => {
                error!("Failed to store messages in memory: {}", e);
                false
            }
        }
    }

    /// Persist actor-wide facts. The session only appears in logs.
    pub async fn store_facts(
        &self,
        facts: &[String],
        actor_id: &str,
        session_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> bool {
        if facts.is_empty() {
            return true;
        }

        info!(
            "Storing {} facts (actor: {}, session: {})",
            facts.len(),
            actor_id,
            session_id
        );

        let records: Vec<MemoryRecord> = facts
            .iter()
            .map(|fact| {
                let mut tags = BTreeMap::new();
                tags.insert("type".to_string(), SEMANTIC_FACT_TYPE.to_string());
                // Caller metadata wins on key collisions
                tags.extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
                MemoryRecord {
                    content: fact.clone(),
                    metadata: tags,
                }
            })
            .collect();

        let namespace = actor_namespace(actor_id);
        match self
            .store
            .store_memories(&self.memory_id, &namespace, &records)
            .await
        {
            Ok(()) => {
                debug!("Successfully stored {} facts", records.len());
                true
            }
            Err(e) => {
                error!("Failed to store facts: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::InMemoryMemoryStore;
    use crate::models::MessageRole;

    fn writer(store: &InMemoryMemoryStore) -> ConversationWriter {
        ConversationWriter::new(Arc::new(store.clone()), MemoryNamespaceId::new("mem-1"))
    }

    #[tokio::test]
    async fn test_store_conversation_writes_pair() {
        let store = InMemoryMemoryStore::new();
        assert!(writer(&store).store_conversation("hi", "hello", "u1", "s1").await);

        let events = store.events(&MemoryNamespaceId::new("mem-1"), "u1", "s1").await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            vec![CanonicalMessage::user("hi"), CanonicalMessage::assistant("hello")]
        );
    }

    #[tokio::test]
    async fn test_store_conversation_rejects_empty_side() {
        let store = InMemoryMemoryStore::new();
        let w = writer(&store);

        assert!(!w.store_conversation("", "x", "u1", "s1").await);
        assert!(!w.store_conversation("x", "", "u1", "s1").await);
        assert_eq!(store.calls().create_event(), 0);
    }

    #[tokio::test]
    async fn test_store_messages_empty_is_success() {
        let store = InMemoryMemoryStore::new();
        assert!(writer(&store).store_messages(&[], "u1", "s1").await);
        assert_eq!(store.calls().create_event(), 0);
    }

    #[tokio::test]
    async fn test_store_messages_all_unclassifiable_is_failure() {
        let store = InMemoryMemoryStore::new();
        let batch = [RawMessage::from_json(serde_json::json!(7))];

        assert!(!writer(&store).store_messages(&batch, "u1", "s1").await);
        assert_eq!(store.calls().create_event(), 0);
    }

    #[tokio::test]
    async fn test_store_batch_reports_normalized_count() {
        let store = InMemoryMemoryStore::new();
        let batch = [
            RawMessage::from("hello"),
            RawMessage::from_json(serde_json::json!(42)),
            RawMessage::record("hi!", Some("assistant")),
        ];

        let outcome = writer(&store).store_batch(&batch, "u1", "s1").await;
        assert_eq!(
            outcome,
            BatchOutcome {
                stored: true,
                normalized: 2
            }
        );
        assert_eq!(store.calls().create_event(), 1);

        let empty = writer(&store).store_batch(&[], "u1", "s1").await;
        assert!(empty.stored);
        assert_eq!(empty.normalized, 0);
    }

    #[tokio::test]
    async fn test_store_messages_single_event() {
        let store = InMemoryMemoryStore::new();
        let batch = [
            RawMessage::record("What do I like?", Some("user")),
            RawMessage::record("Apples.", Some("assistant")),
            RawMessage::record("And?", None),
        ];

        assert!(writer(&store).store_messages(&batch, "u1", "s1").await);

        let events = store.events(&MemoryNamespaceId::new("mem-1"), "u1", "s1").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].len(), 3);
        assert_eq!(events[0][2].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_store_facts_tags_and_namespace() {
        let store = InMemoryMemoryStore::new();
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), "llamaindex".to_string());

        let facts = vec!["fact A".to_string(), "fact B".to_string()];
        assert!(writer(&store).store_facts(&facts, "u1", "s1", &metadata).await);

        let records = store
            .records(&MemoryNamespaceId::new("mem-1"), "/actor/u1/")
            .await;
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.metadata["type"], "semantic_fact");
            assert_eq!(record.metadata["source"], "llamaindex");
        }
        assert_eq!(store.calls().create_event(), 0);
    }

    #[tokio::test]
    async fn test_store_no_facts_is_success() {
        let store = InMemoryMemoryStore::new();
        assert!(writer(&store).store_facts(&[], "u1", "s1", &BTreeMap::new()).await);
        assert_eq!(store.calls().store_memories(), 0);
    }
}
