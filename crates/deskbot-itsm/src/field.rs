//! The field model.
//!
//! A [`Field`] is one unit of data collected from the user. It comes either
//! from the portal field schema of a request type or from a question of the
//! request type's form; [`FieldSource`] carries the source-specific parts.

use std::collections::BTreeMap;

use deskbot_models::{FieldChoice, FormAnswer, JiraSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validate;

/// Id of the synthetic "Other" choice appended to form choice lists.
pub const OTHER_CHOICE_ID: &str = "__other__";

/// Label of the synthetic "Other" choice.
pub const OTHER_CHOICE_NAME: &str = "Other (type custom value)";

/// Prefix of synthesized ids for form-only fields.
pub const FORM_FIELD_PREFIX: &str = "form_";

/// How input for a field is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text, passed through the portal formatter.
    Text,
    /// One of `valid_values`, by 1-based index.
    Select,
    /// Several of `valid_values`, comma-separated indices.
    MultiSelect,
    /// `YYYY-MM-DD`.
    Date,
    /// `YYYY-MM-DD` with optional ` HH:MM`.
    DateTime,
    /// A finite number.
    Number,
    /// Never collectible via chat.
    Attachment,
}

impl FieldKind {
    /// Kind of a portal field.
    pub fn for_portal(schema: &JiraSchema, has_choices: bool) -> Self {
        match schema.schema_type.as_str() {
            "attachment" => FieldKind::Attachment,
            "date" => FieldKind::Date,
            "datetime" => FieldKind::DateTime,
            "number" => FieldKind::Number,
            "array" if has_choices => FieldKind::MultiSelect,
            _ if has_choices => FieldKind::Select,
            _ => FieldKind::Text,
        }
    }

    /// Kind of a form question, from its type code.
    pub fn for_question(code: &str, has_choices: bool) -> Self {
        match code {
            "cd" | "cs" if has_choices => FieldKind::Select,
            "cm" | "cl" if has_choices => FieldKind::MultiSelect,
            "da" => FieldKind::Date,
            "dt" => FieldKind::DateTime,
            "no" => FieldKind::Number,
            "at" => FieldKind::Attachment,
            _ => FieldKind::Text,
        }
    }
}

/// Source-specific part of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FieldSource {
    /// A portal field; values go into the create-request call.
    Portal {
        /// A form question with the same label, answered from this value.
        form_question_id: Option<String>,
    },
    /// A form-only question; values go into the form answers.
    Form {
        /// Question id within the form template.
        question_id: String,
        /// The label repeats across questions and is shown as table rows.
        is_table_field: bool,
        /// Row number for table fields.
        row_number: Option<u32>,
    },
}

/// A field to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Storage key; portal field id or `form_<question id>`.
    pub field_id: String,
    /// Display label.
    pub name: String,
    /// Help text.
    pub description: String,
    /// Whether a value is mandatory.
    pub required: bool,
    /// Whether the field is shown on the portal.
    pub visible: bool,
    /// Selectable values, in display order.
    pub valid_values: Vec<FieldChoice>,
    /// Upstream schema; for form questions `schema_type` is the question code.
    pub schema: JiraSchema,
    /// Input parsing rule.
    pub kind: FieldKind,
    /// Where the field came from.
    #[serde(flatten)]
    pub source: FieldSource,
}

impl Field {
    /// Whether this is a portal field.
    pub fn is_portal(&self) -> bool {
        matches!(self.source, FieldSource::Portal { .. })
    }

    /// The form question this field answers, if any.
    pub fn form_question_id(&self) -> Option<&str> {
        match &self.source {
            FieldSource::Portal { form_question_id } => form_question_id.as_deref(),
            FieldSource::Form { question_id, .. } => Some(question_id),
        }
    }

    /// Display name of a choice id.
    pub fn choice_name(&self, id: &str) -> Option<&str> {
        self.valid_values
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    /// Render a stored portal value as text, `None` when empty.
    pub fn describe_value(&self, value: &Value) -> Option<String> {
        let text = match value {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| self.describe_value(item))
                    .collect();
                parts.join(", ")
            }
            Value::Object(map) => {
                if let Some(id) = map.get("id").and_then(Value::as_str) {
                    self.choice_name(id).unwrap_or(id).to_string()
                } else {
                    ["accountId", "name", "value"]
                        .iter()
                        .find_map(|k| map.get(*k).and_then(Value::as_str))
                        .unwrap_or_default()
                        .to_string()
                }
            }
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Render a form answer as text, `None` when empty.
    pub fn describe_answer(&self, answer: &FormAnswer) -> Option<String> {
        let mut parts: Vec<String> = answer
            .choices
            .iter()
            .flatten()
            .map(|id| self.choice_name(id).unwrap_or(id).to_string())
            .collect();
        if let Some(text) = answer.text.as_deref().filter(|t| !t.trim().is_empty()) {
            parts.push(text.to_string());
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// A validated value, before it is shaped for its destination.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Skipped or not collectible.
    Empty,
    /// Free text or a date, stored as entered (trimmed).
    Text(String),
    /// A number, with the text it was parsed from.
    Number { text: String, value: f64 },
    /// A date with optional time, with the text it was parsed from.
    DateTime { text: String, jira: String },
    /// One choice id.
    Choice(String),
    /// Several choice ids.
    Choices(Vec<String>),
    /// A custom value typed after picking "Other", with any other picks.
    Custom { text: String, choices: Vec<String> },
}

/// Values collected for the selected request type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCollection {
    /// Fields in collection order.
    pub fields: Vec<Field>,
    /// Index of the field being collected; equals `fields.len()` when done.
    pub current_field_index: usize,
    /// Portal values keyed by field id.
    pub collected_values: BTreeMap<String, Value>,
    /// Form answers keyed by question id; `None` for skipped questions.
    pub form_answers: BTreeMap<String, Option<FormAnswer>>,
    /// The user picked "Other" and is typing the custom value.
    pub awaiting_custom_value: bool,
    /// Choices picked alongside "Other" on a multi-select.
    pub pending_choices: Vec<String>,
}

impl FieldCollection {
    /// Start collecting the given fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// The field being collected.
    pub fn current_field(&self) -> Option<&Field> {
        self.fields.get(self.current_field_index)
    }

    /// Whether every field has been collected.
    pub fn is_complete(&self) -> bool {
        self.current_field_index >= self.fields.len()
    }

    /// Store a value for the current field and advance.
    pub fn record(&mut self, value: FieldValue) {
        let Some(field) = self.fields.get(self.current_field_index) else {
            return;
        };
        match &field.source {
            FieldSource::Portal { .. } => {
                let formatted = validate::portal_value(field, &value);
                self.collected_values.insert(field.field_id.clone(), formatted);
            }
            FieldSource::Form { question_id, .. } => {
                self.form_answers
                    .insert(question_id.clone(), validate::form_answer(&value));
            }
        }
        self.awaiting_custom_value = false;
        self.pending_choices.clear();
        self.current_field_index += 1;
    }

    /// Wait for a custom value for the current field.
    pub fn await_custom_value(&mut self, pending_choices: Vec<String>) {
        self.awaiting_custom_value = true;
        self.pending_choices = pending_choices;
    }

    /// Leave custom value entry without storing anything.
    pub fn cancel_custom_value(&mut self) {
        self.awaiting_custom_value = false;
        self.pending_choices.clear();
    }

    /// Move the cursor to `index` and clear the value stored there.
    pub fn rewind_to(&mut self, index: usize) {
        self.cancel_custom_value();
        self.current_field_index = index.min(self.fields.len());
        if let Some(field) = self.fields.get(self.current_field_index) {
            match &field.source {
                FieldSource::Portal { .. } => {
                    self.collected_values.remove(&field.field_id);
                }
                FieldSource::Form { question_id, .. } => {
                    self.form_answers.remove(question_id);
                }
            }
        }
    }

    /// Step back to the previous field. Returns `false` at the first field.
    pub fn step_back(&mut self) -> bool {
        if self.current_field_index == 0 {
            return false;
        }
        self.rewind_to(self.current_field_index - 1);
        true
    }

    /// Display text of the value stored for a field.
    pub fn describe(&self, field: &Field) -> Option<String> {
        match &field.source {
            FieldSource::Portal { .. } => self
                .collected_values
                .get(&field.field_id)
                .and_then(|v| field.describe_value(v)),
            FieldSource::Form { question_id, .. } => self
                .form_answers
                .get(question_id)
                .and_then(|a| a.as_ref())
                .and_then(|a| field.describe_answer(a)),
        }
    }

    /// Whether a field has a non-empty stored value.
    pub fn has_value(&self, field: &Field) -> bool {
        self.describe(field).is_some()
    }

    /// Names of required fields without a value. Attachments are exempt.
    pub fn missing_required(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required && f.kind != FieldKind::Attachment)
            .filter(|f| !self.has_value(f))
            .map(|f| f.name.clone())
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn portal_field(id: &str, name: &str, schema_type: &str, required: bool) -> Field {
        let schema = JiraSchema {
            schema_type: schema_type.to_string(),
            ..JiraSchema::default()
        };
        Field {
            field_id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            required,
            visible: true,
            valid_values: Vec::new(),
            kind: FieldKind::for_portal(&schema, false),
            schema,
            source: FieldSource::Portal {
                form_question_id: None,
            },
        }
    }

    pub(crate) fn with_choices(
        mut field: Field,
        kind: FieldKind,
        choices: &[(&str, &str)],
    ) -> Field {
        field.valid_values = choices
            .iter()
            .map(|(id, name)| FieldChoice::new(*id, *name))
            .collect();
        field.kind = kind;
        field
    }

    pub(crate) fn form_field(
        question_id: &str,
        name: &str,
        kind: FieldKind,
        required: bool,
    ) -> Field {
        Field {
            field_id: format!("{}{}", FORM_FIELD_PREFIX, question_id),
            name: name.to_string(),
            description: String::new(),
            required,
            visible: true,
            valid_values: Vec::new(),
            schema: JiraSchema::default(),
            kind,
            source: FieldSource::Form {
                question_id: question_id.to_string(),
                is_table_field: false,
                row_number: None,
            },
        }
    }

    #[test]
    fn test_kind_for_portal() {
        let schema = |t: &str| JiraSchema {
            schema_type: t.to_string(),
            ..JiraSchema::default()
        };
        assert_eq!(FieldKind::for_portal(&schema("attachment"), false), FieldKind::Attachment);
        assert_eq!(FieldKind::for_portal(&schema("array"), true), FieldKind::MultiSelect);
        assert_eq!(FieldKind::for_portal(&schema("option"), true), FieldKind::Select);
        assert_eq!(FieldKind::for_portal(&schema("option"), false), FieldKind::Text);
        assert_eq!(FieldKind::for_portal(&schema("datetime"), false), FieldKind::DateTime);
    }

    #[test]
    fn test_kind_for_question() {
        assert_eq!(FieldKind::for_question("cd", true), FieldKind::Select);
        assert_eq!(FieldKind::for_question("cd", false), FieldKind::Text);
        assert_eq!(FieldKind::for_question("cm", true), FieldKind::MultiSelect);
        assert_eq!(FieldKind::for_question("da", false), FieldKind::Date);
        assert_eq!(FieldKind::for_question("tl", false), FieldKind::Text);
    }

    #[test]
    fn test_record_routes_by_source() {
        let mut collection = FieldCollection::new(vec![
            portal_field("summary", "Summary", "string", true),
            form_field("4", "Team", FieldKind::Text, false),
        ]);

        collection.record(FieldValue::Text("Laptop broken".into()));
        collection.record(FieldValue::Text("Ops".into()));

        assert!(collection.is_complete());
        assert_eq!(collection.collected_values["summary"], json!("Laptop broken"));
        assert_eq!(collection.form_answers["4"], Some(FormAnswer::text("Ops")));
        assert!(!collection.collected_values.contains_key("form_4"));
    }

    #[test]
    fn test_step_back_clears_value() {
        let mut collection = FieldCollection::new(vec![
            portal_field("summary", "Summary", "string", true),
            portal_field("description", "Description", "string", false),
        ]);
        assert!(!collection.step_back());

        collection.record(FieldValue::Text("first".into()));
        assert!(collection.step_back());
        assert_eq!(collection.current_field_index, 0);
        assert!(collection.collected_values.is_empty());
    }

    #[test]
    fn test_missing_required_skips_attachments() {
        let mut collection = FieldCollection::new(vec![
            portal_field("summary", "Summary", "string", true),
            portal_field("attachment", "Screenshot", "attachment", true),
            form_field("2", "Reason", FieldKind::Text, true),
        ]);
        assert_eq!(collection.missing_required(), vec!["Summary", "Reason"]);

        collection.record(FieldValue::Text("Hello".into()));
        collection.record(FieldValue::Empty);
        collection.record(FieldValue::Text("  ".into()));
        assert_eq!(collection.missing_required(), vec!["Reason"]);
    }

    #[test]
    fn test_describe_choice_values() {
        let field = with_choices(
            portal_field("priority", "Priority", "priority", false),
            FieldKind::Select,
            &[("1", "High"), ("2", "Low")],
        );
        assert_eq!(field.describe_value(&json!({"id": "2"})).as_deref(), Some("Low"));
        assert_eq!(
            field.describe_value(&json!([{"id": "1"}, {"id": "2"}])).as_deref(),
            Some("High, Low")
        );
        assert_eq!(field.describe_value(&json!({"accountId": "abc"})).as_deref(), Some("abc"));
        assert_eq!(field.describe_value(&Value::Null), None);
    }
}
