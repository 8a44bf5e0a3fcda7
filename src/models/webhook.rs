//! Inbound event callbacks from the open platform.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const URL_VERIFICATION: &str = "url_verification";
pub const RECORD_CHANGED_EVENT: &str = "drive.file.bitable_record_changed_v1";

/// Raw callback body. Both the v1 (`type` at the top level) and v2
/// (`header.event_type`) layouts deserialize into this.
#[derive(Debug, Default, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub challenge: Option<String>,
    pub header: Option<EventHeader>,
    #[serde(default)]
    pub event: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventHeader {
    pub event_type: Option<String>,
    pub event_id: Option<String>,
}

impl EventEnvelope {
    pub fn is_url_verification(&self) -> bool {
        self.kind.as_deref() == Some(URL_VERIFICATION)
    }

    /// `header.event_type`, falling back to the top-level `type`.
    pub fn event_type(&self) -> Option<&str> {
        self.header
            .as_ref()
            .and_then(|h| h.event_type.as_deref())
            .or(self.kind.as_deref())
    }

    /// Delivery id from the v2 header; repeats on redelivery.
    pub fn event_id(&self) -> Option<&str> {
        self.header.as_ref().and_then(|h| h.event_id.as_deref())
    }

    /// `(table_id, action_list)` of a record-change event. The action list is
    /// returned untouched; a missing list becomes `[]`.
    pub fn record_change(&self) -> Option<(&str, Value)> {
        let table_id = self.event.get("table_id")?.as_str()?;
        let actions = self
            .event
            .get("action_list")
            .cloned()
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| Value::Array(Vec::new()));
        Some((table_id, actions))
    }
}

/// Payload pushed to browser clients when a watched table changes.
#[derive(Debug, Clone, Serialize)]
pub struct RecordChangedBroadcast {
    pub table_id: String,
    pub actions: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// What the webhook endpoint answers with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WebhookReply {
    Challenge { challenge: String },
    Ack { code: i32, msg: String },
}

impl WebhookReply {
    pub fn ack() -> Self {
        WebhookReply::Ack {
            code: 0,
            msg: "ok".to_string(),
        }
    }
}
