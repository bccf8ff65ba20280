//! Memory Context Manager
//!
//! The single entry point adapters use: `get_context` before a turn and one of
//! the `store_*` calls after it. Holds no agent state; session priming flags
//! live in an owned `SessionTracker`, everything else lives in the store.

use crate::config::{self, ManagerSettings};
use crate::error::MemoryError;
use crate::memory::normalizer::RawMessage;
use crate::memory::remote::HttpMemoryStore;
use crate::memory::retriever::{ContextRetriever, NO_MEMORIES_SENTINEL};
use crate::memory::store::{InMemoryMemoryStore, MemoryStoreClient};
use crate::memory::tracker::SessionTracker;
use crate::memory::writer::{BatchOutcome, ConversationWriter};
use crate::models::{actor_namespace, ContextOptions, MemoryNamespaceId, MemoryStatistics};
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct MemoryContextManager {
    memory_id: MemoryNamespaceId,
    settings: ManagerSettings,
    store: Arc<dyn MemoryStoreClient>,
    retriever: ContextRetriever,
    writer: ConversationWriter,
}

impl MemoryContextManager {
    pub fn new(
        memory_id: MemoryNamespaceId,
        store: Arc<dyn MemoryStoreClient>,
        settings: ManagerSettings,
    ) -> Self {
        Self::with_tracker(memory_id, store, settings, Arc::new(SessionTracker::new()))
    }

    /// Build a manager that shares session priming state with others.
    pub fn with_tracker(
        memory_id: MemoryNamespaceId,
        store: Arc<dyn MemoryStoreClient>,
        settings: ManagerSettings,
        tracker: Arc<SessionTracker>,
    ) -> Self {
        let retriever = ContextRetriever::new(
            Arc::clone(&store),
            memory_id.clone(),
            tracker,
            settings.max_conversation_turns,
        );
        let writer = ConversationWriter::new(Arc::clone(&store), memory_id.clone());

        info!("MemoryContextManager initialized with memory_id: {}", memory_id);

        Self {
            memory_id,
            settings,
            store,
            retriever,
            writer,
        }
    }

    /// Load the namespace file and connect the configured store.
    ///
    /// Fails only on configuration errors.
    pub fn from_settings(settings: ManagerSettings) -> Result<Self> {
        let memory_id = config::load(&settings.config_path)?;
        let store = build_store(&settings)?;
        Ok(Self::new(memory_id, store, settings))
    }

    pub fn memory_id(&self) -> &MemoryNamespaceId {
        &self.memory_id
    }

    fn actor<'a>(&'a self, actor_id: Option<&'a str>) -> &'a str {
        match actor_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => &self.settings.default_actor_id,
        }
    }

    fn session<'a>(&'a self, session_id: Option<&'a str>) -> &'a str {
        match session_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => &self.settings.default_session_id,
        }
    }

    // =============================
    // Read path
    // =============================

    /// Context to prepend to the prompt; empty when there is none.
    pub async fn get_context(
        &self,
        user_input: &str,
        actor_id: Option<&str>,
        session_id: Option<&str>,
    ) -> String {
        self.get_context_with(user_input, actor_id, session_id, ContextOptions::default())
            .await
    }

    pub async fn get_context_with(
        &self,
        user_input: &str,
        actor_id: Option<&str>,
        session_id: Option<&str>,
        options: ContextOptions,
    ) -> String {
        self.retriever
            .get_context(
                user_input,
                self.actor(actor_id),
                self.session(session_id),
                options,
            )
            .await
    }

    /// Human-readable memory listing for a retrieval tool.
    ///
    /// `max_results == 0` means no limit. Never fails; store errors are
    /// reported inside the returned text.
    pub async fn search_memories(
        &self,
        query: &str,
        actor_id: Option<&str>,
        max_results: usize,
    ) -> String {
        let actor_id = self.actor(actor_id);
        info!("Retrieving memories for actor '{}' with query: '{}'", actor_id, query);

        let namespace = actor_namespace(actor_id);
        let mut memories = match self
            .store
            .retrieve_memories(&self.memory_id, &namespace, query)
            .await
        {
            Ok(memories) => memories,
            Err(e) => {
                error!("Failed to retrieve memories: {}", e);
                return format!("Error retrieving memories: {}", e);
            }
        };

        if max_results > 0 {
            memories.truncate(max_results);
        }

        if memories.is_empty() {
            return NO_MEMORIES_SENTINEL.to_string();
        }

        let mut result = format!("Found {} relevant memories:\n", memories.len());
        for (i, memory) in memories.iter().enumerate() {
            result.push_str(&format!("\n{}. {}\n", i + 1, memory.content));
            if !memory.metadata.is_empty() {
                let items: Vec<String> = memory
                    .metadata
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                result.push_str(&format!("   Metadata: {}\n", items.join(", ")));
            }
        }

        info!("Successfully retrieved {} memories for query: '{}'", memories.len(), query);
        result.trim_end().to_string()
    }

    // =============================
    // Write path
    // =============================

    pub async fn store_conversation(
        &self,
        user_input: &str,
        response: &str,
        actor_id: Option<&str>,
        session_id: Option<&str>,
    ) -> bool {
        self.writer
            .store_conversation(
                user_input,
                response,
                self.actor(actor_id),
                self.session(session_id),
            )
            .await
    }

    pub async fn store_messages(
        &self,
        raw_messages: &[RawMessage],
        actor_id: Option<&str>,
        session_id: Option<&str>,
    ) -> bool {
        self.writer
            .store_messages(raw_messages, self.actor(actor_id), self.session(session_id))
            .await
    }

    pub async fn store_message_batch(
        &self,
        raw_messages: &[RawMessage],
        actor_id: Option<&str>,
        session_id: Option<&str>,
    ) -> BatchOutcome {
        self.writer
            .store_batch(raw_messages, self.actor(actor_id), self.session(session_id))
            .await
    }

    pub async fn store_facts(
        &self,
        facts: &[String],
        actor_id: Option<&str>,
        session_id: Option<&str>,
        metadata: Option<&BTreeMap<String, String>>,
    ) -> bool {
        let empty = BTreeMap::new();
        self.writer
            .store_facts(
                facts,
                self.actor(actor_id),
                self.session(session_id),
                metadata.unwrap_or(&empty),
            )
            .await
    }

    // =============================
    // Reporting
    // =============================

    pub async fn statistics(&self) -> MemoryStatistics {
        MemoryStatistics {
            memory_id: self.memory_id.to_string(),
            default_actor_id: self.settings.default_actor_id.clone(),
            default_session_id: self.settings.default_session_id.clone(),
            max_conversation_turns: self.settings.max_conversation_turns,
            initialized_sessions: self.retriever.tracker().initialized_count().await,
        }
    }
}

/// Remote store when `store_url` is configured, otherwise the in-process one.
pub fn build_store(settings: &ManagerSettings) -> Result<Arc<dyn MemoryStoreClient>> {
    if settings.store_url.is_some() {
        return build_remote_store(settings);
    }

    warn!("MEMORY_STORE_URL not set, memory will not outlive this process");
    info!("Memory store backend: in-memory");
    Ok(Arc::new(InMemoryMemoryStore::new()))
}

/// The remote store only; fails when no `store_url` is configured.
pub fn build_remote_store(settings: &ManagerSettings) -> Result<Arc<dyn MemoryStoreClient>> {
    let url = settings.store_url.as_deref().ok_or_else(|| {
        MemoryError::ConfigMalformed("MEMORY_STORE_URL must be set to persist memory".into())
    })?;

    info!("Memory store backend: remote ({})", url);
    Ok(Arc::new(HttpMemoryStore::new(url, settings.store_timeout)?))
}
