//! Message normalization
//!
//! Adapters hand over framework-native messages as one of a small closed set
//! of shapes. Each is converted to `CanonicalMessage`s; anything that cannot
//! be classified is skipped so one bad element never sinks the batch.

use crate::error::MemoryError;
use crate::models::{CanonicalMessage, MessageRole};
use crate::Result;
use serde_json::Value;
use tracing::{debug, warn};

const USER_PROMPT_PART: &str = "user-prompt";
const SYSTEM_PROMPT_PART: &str = "system-prompt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
    Other(String),
}

impl MessageKind {
    fn parse(kind: &str) -> Self {
        match kind {
            "request" => MessageKind::Request,
            "response" => MessageKind::Response,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

/// One part of a multi-part message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePart {
    pub part_kind: Option<String>,
    /// Parts without content (tool calls, retries) are not stored
    pub content: Option<Value>,
}

/// Multi-part message with a request/response discriminator.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredMessage {
    pub kind: Option<MessageKind>,
    /// Framework type name, consulted only when `kind` is absent
    pub type_name: Option<String>,
    pub parts: Vec<MessagePart>,
}

/// Input shapes accepted by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawMessage {
    /// Plain text from the user
    Text(String),
    /// Explicit content/role record; role defaults to USER
    Record {
        content: Value,
        role: Option<String>,
    },
    Structured(StructuredMessage),
    /// Anything else; always skipped
    Opaque(Value),
}

impl RawMessage {
    pub fn record(content: impl Into<String>, role: Option<&str>) -> Self {
        RawMessage::Record {
            content: Value::String(content.into()),
            role: role.map(str::to_string),
        }
    }

    /// Classify a JSON value by shape.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => RawMessage::Text(text),
            Value::Object(map) => {
                if map.contains_key("parts") {
                    match structured_from_json(&map) {
                        Some(structured) => RawMessage::Structured(structured),
                        None => RawMessage::Opaque(Value::Object(map)),
                    }
                } else if let Some(content) = map.get("content").cloned() {
                    match map.get("role").cloned() {
                        None | Some(Value::Null) => RawMessage::Record {
                            content,
                            role: None,
                        },
                        Some(Value::String(role)) => RawMessage::Record {
                            content,
                            role: Some(role),
                        },
                        Some(_) => RawMessage::Opaque(Value::Object(map)),
                    }
                } else {
                    RawMessage::Opaque(Value::Object(map))
                }
            }
            other => RawMessage::Opaque(other),
        }
    }
}

impl From<&str> for RawMessage {
    fn from(text: &str) -> Self {
        RawMessage::Text(text.to_string())
    }
}

impl From<String> for RawMessage {
    fn from(text: String) -> Self {
        RawMessage::Text(text)
    }
}

impl From<Value> for RawMessage {
    fn from(value: Value) -> Self {
        RawMessage::from_json(value)
    }
}

fn structured_from_json(map: &serde_json::Map<String, Value>) -> Option<StructuredMessage> {
    let parts = map.get("parts")?.as_array()?;

    let parts = parts
        .iter()
        .map(|part| {
            let part = part.as_object()?;
            Some(MessagePart {
                part_kind: part
                    .get("part_kind")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                content: part.get("content").filter(|c| !c.is_null()).cloned(),
            })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(StructuredMessage {
        kind: map.get("kind").and_then(Value::as_str).map(MessageKind::parse),
        type_name: map
            .get("type_name")
            .or_else(|| map.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string),
        parts,
    })
}

/// Stored content is always text; structured content is JSON-encoded.
fn content_to_text(content: &Value) -> Result<String> {
    match content {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Err(MemoryError::InvalidMessage("content is null".into())),
        other => Ok(serde_json::to_string(other)?),
    }
}

fn resolve_part_role(message: &StructuredMessage, part: &MessagePart) -> MessageRole {
    match &message.kind {
        Some(MessageKind::Request) => match part.part_kind.as_deref() {
            Some(USER_PROMPT_PART) => MessageRole::User,
            Some(SYSTEM_PROMPT_PART) => MessageRole::System,
            _ => MessageRole::User,
        },
        Some(MessageKind::Response) | Some(MessageKind::Other(_)) => MessageRole::Assistant,
        None => {
            let looks_like_response = message
                .type_name
                .as_deref()
                .map(|name| name.contains("Response"))
                .unwrap_or(false);
            if looks_like_response {
                MessageRole::Assistant
            } else {
                MessageRole::User
            }
        }
    }
}

/// Normalize a single element. Multi-part messages yield one entry per part
/// that carries content.
pub fn normalize_one(message: &RawMessage) -> Result<Vec<CanonicalMessage>> {
    match message {
        RawMessage::Text(text) => Ok(vec![CanonicalMessage::user(text.clone())]),
        RawMessage::Record { content, role } => {
            let role = match role.as_deref() {
                None => MessageRole::User,
                Some(label) => MessageRole::from_label(label).ok_or_else(|| {
                    MemoryError::InvalidMessage(format!("unknown role '{}'", label))
                })?,
            };
            Ok(vec![CanonicalMessage::new(content_to_text(content)?, role)])
        }
        RawMessage::Structured(structured) => structured
            .parts
            .iter()
            .filter_map(|part| part.content.as_ref().map(|c| (part, c)))
            .map(|(part, content)| {
                Ok(CanonicalMessage::new(
                    content_to_text(content)?,
                    resolve_part_role(structured, part),
                ))
            })
            .collect(),
        RawMessage::Opaque(value) => Err(MemoryError::InvalidMessage(format!(
            "unsupported message shape: {}",
            shape_name(value)
        ))),
    }
}

/// Normalize a batch, skipping elements that cannot be classified.
pub fn normalize(messages: &[RawMessage]) -> Vec<CanonicalMessage> {
    let mut normalized = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        match normalize_one(message) {
            Ok(converted) => normalized.extend(converted),
            Err(e) => warn!("Failed to convert message {} for storage: {}", index, e),
        }
    }

    debug!(
        "Normalized {} raw messages into {} canonical messages",
        messages.len(),
        normalized.len()
    );
    normalized
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structured(value: Value) -> RawMessage {
        let raw = RawMessage::from_json(value);
        assert!(matches!(raw, RawMessage::Structured(_)));
        raw
    }

    #[test]
    fn test_empty_batch() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_plain_text_is_user() {
        let out = normalize(&["hello".into()]);
        assert_eq!(out, vec![CanonicalMessage::user("hello")]);
    }

    #[test]
    fn test_record_roles() {
        let out = normalize(&[
            RawMessage::record("hi", None),
            RawMessage::record("hello there", Some("assistant")),
            RawMessage::record("be brief", Some("system")),
        ]);

        let roles: Vec<MessageRole> = out.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::System]
        );
    }

    #[test]
    fn test_record_with_unknown_role_is_skipped() {
        let out = normalize(&[
            RawMessage::record("result", Some("tool")),
            RawMessage::record("kept", None),
        ]);
        assert_eq!(out, vec![CanonicalMessage::user("kept")]);
    }

    #[test]
    fn test_unclassifiable_element_is_skipped() {
        let out = normalize(&[RawMessage::from_json(json!(42)), "valid".into()]);
        assert_eq!(out, vec![CanonicalMessage::user("valid")]);
    }

    #[test]
    fn test_non_string_content_is_json_encoded() {
        let out = normalize(&[RawMessage::from_json(json!({
            "role": "assistant",
            "content": [{"text": "Apples."}]
        }))]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, r#"[{"text":"Apples."}]"#);
        assert_eq!(out[0].role, MessageRole::Assistant);
    }

    #[test]
    fn test_structured_request_parts() {
        let raw = structured(json!({
            "kind": "request",
            "parts": [
                {"part_kind": "system-prompt", "content": "Be concise."},
                {"part_kind": "user-prompt", "content": "What fruit do I like?"},
                {"part_kind": "retry-prompt", "content": "try again"}
            ]
        }));

        let out = normalize(&[raw]);
        let roles: Vec<MessageRole> = out.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::System, MessageRole::User, MessageRole::User]
        );
    }

    #[test]
    fn test_structured_response_skips_parts_without_content() {
        let raw = structured(json!({
            "kind": "response",
            "parts": [
                {"part_kind": "tool-call"},
                {"part_kind": "text", "content": "You like apples."}
            ]
        }));

        let out = normalize(&[raw]);
        assert_eq!(out, vec![CanonicalMessage::assistant("You like apples.")]);
    }

    #[test]
    fn test_structured_unknown_kind_is_assistant() {
        let raw = structured(json!({
            "kind": "tool-return",
            "parts": [{"content": "42"}]
        }));
        assert_eq!(normalize(&[raw])[0].role, MessageRole::Assistant);
    }

    #[test]
    fn test_structured_without_kind_uses_type_name() {
        let response = structured(json!({
            "type_name": "ModelResponse",
            "parts": [{"content": "sure"}]
        }));
        let request = structured(json!({
            "type_name": "ModelRequest",
            "parts": [{"content": "please"}]
        }));

        let out = normalize(&[response, request]);
        assert_eq!(out[0].role, MessageRole::Assistant);
        assert_eq!(out[1].role, MessageRole::User);
    }

    #[test]
    fn test_malformed_parts_are_opaque() {
        let raw = RawMessage::from_json(json!({"kind": "request", "parts": "oops"}));
        assert!(matches!(raw, RawMessage::Opaque(_)));

        let raw = RawMessage::from_json(json!({"content": "x", "role": 7}));
        assert!(matches!(raw, RawMessage::Opaque(_)));
    }

    #[test]
    fn test_order_is_preserved() {
        let out = normalize(&[
            "first".into(),
            RawMessage::record("second", Some("assistant")),
            RawMessage::from_json(json!(null)),
            "third".into(),
        ]);
        let texts: Vec<&str> = out.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }
}
