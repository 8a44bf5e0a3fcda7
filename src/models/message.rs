use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;

pub const DEFAULT_RECEIVE_ID_TYPE: &str = "open_id";

/// The message kinds the gateway treats specially. Everything else is
/// forwarded with the generic rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Interactive,
    Other(String),
}

impl MessageKind {
    pub fn parse(msg_type: &str) -> Self {
        match msg_type {
            "text" => MessageKind::Text,
            "interactive" => MessageKind::Interactive,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

/// Outbound body of `im/v1/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub receive_id: String,
    pub msg_type: String,
    /// Always a JSON-encoded string, whatever the kind.
    pub content: String,
}

/// Turn caller-supplied content into the string the platform expects.
///
/// Plain text given as a raw string is wrapped as `{"text": ...}`. Card
/// content given as a string must parse as JSON; it is re-serialized so
/// malformed cards fail here instead of upstream.
pub fn format_content(kind: &MessageKind, content: &Value) -> Result<String, AppError> {
    match (kind, content) {
        (MessageKind::Text, Value::String(text)) => {
            Ok(serde_json::json!({ "text": text }).to_string())
        }
        (MessageKind::Interactive, Value::String(raw)) => {
            let card: Value = serde_json::from_str(raw).map_err(|e| {
                AppError::ContentFormat(format!("interactive card content is not valid JSON: {}", e))
            })?;
            Ok(card.to_string())
        }
        (_, Value::String(raw)) => Ok(raw.clone()),
        (_, structured) => Ok(structured.to_string()),
    }
}

/// `content` counts as missing when null or an empty string.
pub fn content_is_empty(content: &Value) -> bool {
    match content {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
