//! Core data models shared by the memory components

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Actor used when an adapter does not supply one.
pub const DEFAULT_ACTOR_ID: &str = "my-user-id";

/// Session used when an adapter does not supply one.
pub const DEFAULT_SESSION_ID: &str = "DEFAULT";

/// Metadata tag attached to every semantic fact.
pub const SEMANTIC_FACT_TYPE: &str = "semantic_fact";

//
// ================= Identifiers =================
//

/// Opaque identifier of the memory partition a deployment writes into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryNamespaceId(String);

impl MemoryNamespaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryNamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local bookkeeping key for one conversation thread, displayed as
/// `actor:session`.
///
/// Equality compares actor and session separately, so ids containing `:`
/// never alias another thread. Never sent to the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    actor_id: String,
    session_id: String,
}

impl SessionKey {
    pub fn new(actor_id: &str, session_id: &str) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            session_id: session_id.to_string(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.actor_id, self.session_id)
    }
}

/// Actor-wide namespace under which retrieval and fact storage happen.
pub fn actor_namespace(actor_id: &str) -> String {
    format!("/actor/{}/", actor_id)
}

//
// ================= Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "USER",
            MessageRole::Assistant => "ASSISTANT",
            MessageRole::System => "SYSTEM",
        }
    }

    /// Parse the role labels used by the supported agent frameworks.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "user" | "human" => Some(MessageRole::User),
            "assistant" | "ai" | "model" | "agent" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only message shape the core persists or formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub text: String,
    pub role: MessageRole,
}

impl CanonicalMessage {
    pub fn new(text: impl Into<String>, role: MessageRole) -> Self {
        Self {
            text: text.into(),
            role,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, MessageRole::User)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text, MessageRole::Assistant)
    }
}

/// One exchange as returned by the store for history replay, oldest message first.
pub type Turn = Vec<CanonicalMessage>;

//
// ================= Memories =================
//

/// A record retrieved from the store. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Memory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
            score: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A record to be written into an actor namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

//
// ================= Options & Reporting =================
//

/// Which parts of the context block `get_context` should assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextOptions {
    pub load_history: bool,
    pub load_relevant: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            load_history: true,
            load_relevant: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStatistics {
    pub memory_id: String,
    pub default_actor_id: String,
    pub default_session_id: String,
    pub max_conversation_turns: usize,
    pub initialized_sessions: usize,
}
