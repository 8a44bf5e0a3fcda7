use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::null_as_default;

/// A row as the platform returns it. `fields` is opaque: the gateway never
/// validates values against the schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "null_as_default")]
    pub record_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Record>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// `data` of a create/update call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub deleted: bool,
    pub record_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDeleted {
    pub deleted: bool,
    pub count: usize,
}

/// Addresses one table inside one base.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub base_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(base_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        Self {
            base_id: base_id.into(),
            table_id: table_id.into(),
        }
    }

    /// Path below the API root, e.g. `bitable/v1/apps/{base}/tables/{table}/records`.
    pub fn path(&self, suffix: &str) -> String {
        format!(
            "bitable/v1/apps/{}/tables/{}/{}",
            urlencoding::encode(&self.base_id),
            urlencoding::encode(&self.table_id),
            suffix
        )
    }
}
