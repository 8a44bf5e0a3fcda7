//! Table schema description.
//!
//! The open platform identifies column kinds by bare integers. `FieldType`
//! gives them names so form rendering can match on variants instead of
//! comparing against magic numbers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::null_as_default;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum FieldType {
    Text,
    Number,
    SingleSelect,
    MultiSelect,
    DateTime,
    Checkbox,
    User,
    Phone,
    Url,
    Attachment,
    SingleLink,
    Lookup,
    Formula,
    DuplexLink,
    Location,
    GroupChat,
    CreatedTime,
    ModifiedTime,
    CreatedUser,
    ModifiedUser,
    AutoNumber,
    /// A code this build does not know about; kept so it can be echoed back.
    Unknown(i64),
}

impl FieldType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => FieldType::Text,
            2 => FieldType::Number,
            3 => FieldType::SingleSelect,
            4 => FieldType::MultiSelect,
            5 => FieldType::DateTime,
            7 => FieldType::Checkbox,
            11 => FieldType::User,
            13 => FieldType::Phone,
            15 => FieldType::Url,
            17 => FieldType::Attachment,
            18 => FieldType::SingleLink,
            19 => FieldType::Lookup,
            20 => FieldType::Formula,
            21 => FieldType::DuplexLink,
            22 => FieldType::Location,
            23 => FieldType::GroupChat,
            1001 => FieldType::CreatedTime,
            1002 => FieldType::ModifiedTime,
            1003 => FieldType::CreatedUser,
            1004 => FieldType::ModifiedUser,
            1005 => FieldType::AutoNumber,
            other => FieldType::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            FieldType::Text => 1,
            FieldType::Number => 2,
            FieldType::SingleSelect => 3,
            FieldType::MultiSelect => 4,
            FieldType::DateTime => 5,
            FieldType::Checkbox => 7,
            FieldType::User => 11,
            FieldType::Phone => 13,
            FieldType::Url => 15,
            FieldType::Attachment => 17,
            FieldType::SingleLink => 18,
            FieldType::Lookup => 19,
            FieldType::Formula => 20,
            FieldType::DuplexLink => 21,
            FieldType::Location => 22,
            FieldType::GroupChat => 23,
            FieldType::CreatedTime => 1001,
            FieldType::ModifiedTime => 1002,
            FieldType::CreatedUser => 1003,
            FieldType::ModifiedUser => 1004,
            FieldType::AutoNumber => 1005,
            FieldType::Unknown(code) => code,
        }
    }
}

impl From<i64> for FieldType {
    fn from(code: i64) -> Self {
        FieldType::from_code(code)
    }
}

impl From<FieldType> for i64 {
    fn from(t: FieldType) -> Self {
        t.code()
    }
}

/// One column of a table. Keys the gateway does not model are carried in
/// `extra` and serialized back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableField {
    #[serde(default, deserialize_with = "null_as_default")]
    pub field_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub field_name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<TableField>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_codes_decode() {
        assert_eq!(FieldType::from_code(3), FieldType::SingleSelect);
        assert_eq!(FieldType::from_code(18), FieldType::SingleLink);
        assert_eq!(FieldType::from_code(21), FieldType::DuplexLink);
        assert_eq!(FieldType::from_code(1001), FieldType::CreatedTime);
    }

    #[test]
    fn test_unknown_code_survives() {
        let t = FieldType::from_code(9999);
        assert_eq!(t, FieldType::Unknown(9999));
        assert_eq!(t.code(), 9999);
    }

    #[test]
    fn test_every_named_variant_maps_back_to_its_code() {
        for code in [1, 2, 3, 4, 5, 7, 11, 13, 15, 17, 18, 19, 20, 21, 22, 23, 1001, 1002, 1003, 1004, 1005] {
            let t = FieldType::from_code(code);
            assert!(!matches!(t, FieldType::Unknown(_)), "code {} should be named", code);
            assert_eq!(t.code(), code);
        }
    }

    #[test]
    fn test_field_keeps_unmodelled_keys() {
        let raw = json!({
            "field_id": "fld1",
            "field_name": "Project Status",
            "type": 3,
            "ui_type": "SingleSelect",
            "is_primary": false,
            "property": {"options": [{"name": "New"}, {"name": "Completed"}]}
        });
        let field: TableField = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(field.field_type, FieldType::SingleSelect);
        assert_eq!(serde_json::to_value(&field).unwrap(), raw);
    }

    #[test]
    fn test_null_items_become_empty() {
        let page: FieldPage =
            serde_json::from_value(json!({"items": null, "has_more": false})).unwrap();
        assert!(page.items.is_empty());
    }
}
