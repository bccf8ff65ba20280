//! Context retrieval
//!
//! Builds the block of memory context an adapter prepends to its prompt:
//! the session's recent conversation (once per session) followed by
//! long-term memories relevant to the current input. Every store failure
//! degrades to "no context"; nothing here returns an error.

use crate::memory::store::MemoryStoreClient;
use crate::memory::tracker::SessionTracker;
use crate::models::{actor_namespace, ContextOptions, Memory, MemoryNamespaceId, SessionKey};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CONVERSATION_LABEL: &str = "Recent conversation:";
pub const RELEVANT_MEMORY_LABEL: &str = "Relevant long-term memory context:";
pub const NO_MEMORIES_SENTINEL: &str = "No relevant memories found.";

pub struct ContextRetriever {
    store: Arc<dyn MemoryStoreClient>,
    memory_id: MemoryNamespaceId,
    tracker: Arc<SessionTracker>,
    max_conversation_turns: usize,
}

impl ContextRetriever {
    pub fn new(
        store: Arc<dyn MemoryStoreClient>,
        memory_id: MemoryNamespaceId,
        tracker: Arc<SessionTracker>,
        max_conversation_turns: usize,
    ) -> Self {
        Self {
            store,
            memory_id,
            tracker,
            max_conversation_turns,
        }
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Assemble the context block for one turn. Empty means "nothing to prepend".
    pub async fn get_context(
        &self,
        user_input: &str,
        actor_id: &str,
        session_id: &str,
        options: ContextOptions,
    ) -> String {
        let session_key = SessionKey::new(actor_id, session_id);
        let mut blocks: Vec<String> = Vec::with_capacity(2);

        if options.load_history && self.tracker.should_load_history(&session_key).await {
            info!("Loading conversation context for session: {}", session_key);
            let conversation = self.load_conversation_context(actor_id, session_id).await;
            if !conversation.is_empty() {
                blocks.push(format!("{}\n{}", CONVERSATION_LABEL, conversation));
                info!("Added conversation context to memory context");
            }

            self.tracker.mark_loaded(&session_key).await;
        }

        if options.load_relevant && !user_input.is_empty() {
            let memories = self.retrieve_memories_for_actor(actor_id, user_input).await;
            if memories.is_empty() {
                info!("No relevant memories found");
            } else {
                blocks.push(format!(
                    "{}\n{}",
                    RELEVANT_MEMORY_LABEL,
                    format_memory_context(&memories)
                ));
                info!(
                    "Added {} relevant memories to memory context",
                    memories.len()
                );
            }
        }

        blocks.join("\n\n")
    }

    /// Recent turns as "ROLE: text" lines, oldest first.
    pub async fn load_conversation_context(&self, actor_id: &str, session_id: &str) -> String {
        debug!(actor_id, session_id, "Loading conversation history");

        let turns = match self
            .store
            .get_last_k_turns(
                &self.memory_id,
                actor_id,
                session_id,
                self.max_conversation_turns,
            )
            .await
        {
            Ok(turns) => turns,
            Err(e) => {
                warn!("Failed to retrieve conversation history: {}", e);
                return String::new();
            }
        };

        debug!("Retrieved {} conversation turns", turns.len());

        // Store returns newest turn first
        let lines: Vec<String> = turns
            .iter()
            .rev()
            .flat_map(|turn| turn.iter())
            .map(|message| format!("{}: {}", message.role, render_stored_content(&message.text)))
            .collect();

        debug!("Loaded conversation context from {} messages", lines.len());
        lines.join("\n")
    }

    /// Relevance query in the actor namespace; failures read as "nothing found".
    pub async fn retrieve_memories_for_actor(&self, actor_id: &str, query: &str) -> Vec<Memory> {
        let namespace = actor_namespace(actor_id);

        match self
            .store
            .retrieve_memories(&self.memory_id, &namespace, query)
            .await
        {
            Ok(memories) => {
                debug!(
                    "Retrieved {} memories from namespace {} with query '{}'",
                    memories.len(),
                    namespace,
                    query
                );
                memories
            }
            Err(e) => {
                warn!("Failed to retrieve memories: {}", e);
                Vec::new()
            }
        }
    }
}

/// Numbered listing of memories; metadata is appended when present.
pub fn format_memory_context(memories: &[Memory]) -> String {
    if memories.is_empty() {
        return NO_MEMORIES_SENTINEL.to_string();
    }

    memories
        .iter()
        .enumerate()
        .map(|(i, memory)| {
            let mut entry = format!("{}. {}", i + 1, memory.content);
            if !memory.metadata.is_empty() {
                let metadata: Vec<String> = memory
                    .metadata
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                entry.push_str(&format!(" (Metadata: {})", metadata.join(", ")));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Content written as JSON (text blocks from multi-part messages) is shown
/// as its text; anything undecodable is shown verbatim.
pub fn render_stored_content(content: &str) -> String {
    let trimmed = content.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return content.to_string();
    }

    let Ok(parsed) = serde_json::from_str::<Value>(content) else {
        return content.to_string();
    };

    match block_text(&parsed) {
        Some(text) => text,
        None => parsed.to_string(),
    }
}

fn block_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("text").and_then(Value::as_str).map(str::to_string),
        Value::Array(blocks) if !blocks.is_empty() => {
            let texts = blocks.iter().map(block_text).collect::<Option<Vec<_>>>()?;
            Some(texts.join(" "))
        }
        _ => None,
    }
}
