//! HTTP client for a remote memory store
//!
//! Speaks a small JSON protocol and uses a long-lived reqwest::Client for
//! connection pooling. Every call is attempted once; timeouts and transport
//! failures are reported as store errors for the manager to absorb.

use crate::error::MemoryError;
use crate::memory::store::MemoryStoreClient;
use crate::models::{CanonicalMessage, Memory, MemoryNamespaceId, MemoryRecord, MessageRole, Turn};
use crate::Result;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Reusable store client (connection-pooled)
pub struct HttpMemoryStore {
    client: Client,
    base_url: String,
}

impl HttpMemoryStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Memory store error response ({}): {}", status, message);
            return Err(MemoryError::StoreRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

fn map_transport_error(e: reqwest::Error) -> MemoryError {
    if e.is_timeout() {
        MemoryError::StoreTimeout
    } else if e.is_connect() {
        MemoryError::StoreUnavailable(e.to_string())
    } else {
        MemoryError::HttpError(e)
    }
}

/// Deterministic token identifying one event, so a store can drop repeats.
pub fn event_client_token(
    memory_id: &MemoryNamespaceId,
    actor_id: &str,
    session_id: &str,
    messages: &[CanonicalMessage],
) -> String {
    let mut hasher = Sha256::new();
    for field in [memory_id.as_str(), actor_id, session_id] {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    for message in messages {
        hasher.update(message.role.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(message.text.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&CanonicalMessage> for WireMessage {
    fn from(message: &CanonicalMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.text.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateEventRequest<'a> {
    memory_id: &'a str,
    actor_id: &'a str,
    session_id: &'a str,
    client_token: String,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    memory_id: &'a str,
    namespace: &'a str,
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    memories: Vec<Memory>,
}

#[derive(Debug, Deserialize)]
struct TurnsResponse {
    #[serde(default)]
    turns: Vec<Vec<WireMessage>>,
}

#[derive(Debug, Serialize)]
struct StoreRecordsRequest<'a> {
    memory_id: &'a str,
    namespace: &'a str,
    records: &'a [MemoryRecord],
}

fn into_turn(messages: Vec<WireMessage>) -> Turn {
    messages
        .into_iter()
        .filter_map(|m| match MessageRole::from_label(&m.role) {
            Some(role) => Some(CanonicalMessage::new(m.content, role)),
            None => {
                warn!("Skipping stored message with unknown role: {}", m.role);
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl MemoryStoreClient for HttpMemoryStore {
    async fn create_event(
        &self,
        memory_id: &MemoryNamespaceId,
        actor_id: &str,
        session_id: &str,
        messages: &[CanonicalMessage],
    ) -> Result<()> {
        let body = CreateEventRequest {
            memory_id: memory_id.as_str(),
            actor_id,
            session_id,
            client_token: event_client_token(memory_id, actor_id, session_id, messages),
            messages: messages.iter().map(WireMessage::from).collect(),
        };

        debug!(client_token = %body.client_token, "Sending event to memory store");
        self.send(self.client.post(self.url("events")).json(&body))
            .await?;
        Ok(())
    }

    async fn retrieve_memories(
        &self,
        memory_id: &MemoryNamespaceId,
        namespace: &str,
        query: &str,
    ) -> Result<Vec<Memory>> {
        let body = RetrieveRequest {
            memory_id: memory_id.as_str(),
            namespace,
            query,
        };

        let response = self
            .send(self.client.post(self.url("memories/retrieve")).json(&body))
            .await?;
        let parsed: RetrieveResponse = response.json().await.map_err(map_transport_error)?;
        Ok(parsed.memories)
    }

    async fn get_last_k_turns(
        &self,
        memory_id: &MemoryNamespaceId,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<Turn>> {
        let k = k.to_string();
        let request = self.client.get(self.url("turns")).query(&[
            ("memory_id", memory_id.as_str()),
            ("actor_id", actor_id),
            ("session_id", session_id),
            ("k", k.as_str()),
        ]);

        let response = self.send(request).await?;
        let parsed: TurnsResponse = response.json().await.map_err(map_transport_error)?;
        Ok(parsed.turns.into_iter().map(into_turn).collect())
    }

    async fn store_memories(
        &self,
        memory_id: &MemoryNamespaceId,
        namespace: &str,
        records: &[MemoryRecord],
    ) -> Result<()> {
        let body = StoreRecordsRequest {
            memory_id: memory_id.as_str(),
            namespace,
            records,
        };

        self.send(self.client.post(self.url("memories")).json(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> Vec<CanonicalMessage> {
        vec![
            CanonicalMessage::user("What fruit do I like?"),
            CanonicalMessage::assistant("Apples."),
        ]
    }

    #[test]
    fn test_client_token_is_deterministic() {
        let id = MemoryNamespaceId::new("mem-1");
        let a = event_client_token(&id, "u1", "s1", &exchange());
        let b = event_client_token(&id, "u1", "s1", &exchange());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_client_token_depends_on_scope_and_order() {
        let id = MemoryNamespaceId::new("mem-1");
        let base = event_client_token(&id, "u1", "s1", &exchange());

        assert_ne!(base, event_client_token(&id, "u1", "s2", &exchange()));

        let mut reversed = exchange();
        reversed.reverse();
        assert_ne!(base, event_client_token(&id, "u1", "s1", &reversed));
    }

    #[test]
    fn test_create_event_serialization() {
        let id = MemoryNamespaceId::new("mem-1");
        let messages = exchange();
        let request = CreateEventRequest {
            memory_id: id.as_str(),
            actor_id: "u1",
            session_id: "s1",
            client_token: event_client_token(&id, "u1", "s1", &messages),
            messages: messages.iter().map(WireMessage::from).collect(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "USER");
        assert_eq!(json["messages"][1]["content"], "Apples.");
    }

    #[test]
    fn test_into_turn_skips_unknown_roles() {
        let wire = |role: &str, content: &str| WireMessage {
            role: role.to_string(),
            content: content.to_string(),
        };
        let turn = into_turn(vec![
            wire("USER", "hi"),
            wire("TOOL", "{}"),
            wire("ASSISTANT", "hello"),
        ]);
        assert_eq!(turn.len(), 2);
        assert_eq!(turn[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_an_error() {
        let store =
            HttpMemoryStore::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let result = store
            .get_last_k_turns(&MemoryNamespaceId::new("mem-1"), "u1", "s1", 5)
            .await;
        assert!(result.is_err());
        assert!(!result.unwrap_err().is_fatal());
    }
}
