//! Request creation payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a create-request call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// Target service desk.
    pub service_desk_id: String,

    /// Request type to create.
    pub request_type_id: String,

    /// Portal field values keyed by field id.
    pub request_field_values: Map<String, Value>,
}

impl CreateRequest {
    /// Build a request, dropping null and empty values.
    pub fn new(
        service_desk_id: impl Into<String>,
        request_type_id: impl Into<String>,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let request_field_values = values
            .into_iter()
            .filter(|(_, v)| !is_empty_value(v))
            .collect();
        Self {
            service_desk_id: service_desk_id.into(),
            request_type_id: request_type_id.into(),
            request_field_values,
        }
    }
}

/// Whether a stored value counts as "no answer".
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Result of a create-request call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRequest {
    /// Numeric issue id.
    pub issue_id: String,

    /// Issue key, e.g. `IT-42`.
    pub issue_key: String,
}

/// A form instance attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedForm {
    /// Form instance id.
    pub id: String,
}
