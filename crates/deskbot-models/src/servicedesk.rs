//! Service desk catalogue types.
//!
//! These mirror the Jira Service Management `servicedeskapi` payloads closely
//! enough to be deserialized from them directly.

use serde::{Deserialize, Deserializer, Serialize};

/// A service desk (the ITSM project a request is filed against).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDesk {
    /// Service desk id.
    pub id: String,

    /// Id of the backing Jira project.
    #[serde(default)]
    pub project_id: String,

    /// Display name of the backing project.
    pub project_name: String,

    /// Short project key, e.g. `IT`.
    pub project_key: String,
}

/// A portal group ("Contact us about...") used to categorise request types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalGroup {
    /// Group id.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Display name.
    pub name: String,
}

/// A request type offered by a service desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestType {
    /// Request type id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Optional description shown to customers.
    #[serde(default)]
    pub description: String,

    /// Portal groups this request type is listed under.
    ///
    /// Upstream returns these as strings or integers depending on the
    /// endpoint, so both are normalized to strings here.
    #[serde(default, deserialize_with = "string_or_number_vec")]
    pub group_ids: Vec<String>,
}

impl RequestType {
    /// Whether this request type is listed under the given portal group.
    ///
    /// Checks the group id verbatim and in its integer-parsed form.
    pub fn belongs_to(&self, group: &PortalGroup) -> bool {
        if self.group_ids.iter().any(|g| g == &group.id) {
            return true;
        }
        match group.id.trim().parse::<i64>() {
            Ok(n) => {
                let normalized = n.to_string();
                self.group_ids.iter().any(|g| g == &normalized)
            }
            Err(_) => false,
        }
    }
}

/// One selectable value of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChoice {
    /// Value id sent back upstream.
    #[serde(alias = "value")]
    pub id: String,

    /// Label shown to the user.
    #[serde(alias = "label")]
    pub name: String,
}

impl FieldChoice {
    /// Creates a new choice.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The `jiraSchema` block of a portal field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraSchema {
    /// Raw type tag (`string`, `user`, `array`, `date`, ...).
    #[serde(rename = "type", default)]
    pub schema_type: String,

    /// Element type for `array` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,

    /// System field name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Custom field type key, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

/// A field of a request type as returned by the portal fields API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalField {
    /// Field id (`summary`, `customfield_10010`, ...).
    pub field_id: String,

    /// Display label.
    pub name: String,

    /// Help text.
    #[serde(default)]
    pub description: String,

    /// Whether a value is mandatory.
    #[serde(default)]
    pub required: bool,

    /// Whether the field is shown on the portal.
    #[serde(default = "default_visible")]
    pub visible: bool,

    /// Allowed values for choice fields.
    #[serde(default)]
    pub valid_values: Vec<FieldChoice>,

    /// Upstream schema.
    #[serde(default)]
    pub jira_schema: JiraSchema,
}

fn default_visible() -> bool {
    true
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    value_to_string(value).ok_or_else(|| serde::de::Error::custom("expected string or number"))
}

fn string_or_number_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(values.into_iter().filter_map(value_to_string).collect())
}

fn value_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
