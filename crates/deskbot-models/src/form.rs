//! Form (questionnaire) types.
//!
//! Forms are a separate subsystem from portal fields: a request type may have
//! a form template attached whose questions duplicate or extend the portal
//! fields.

use serde::{Deserialize, Serialize};

use crate::servicedesk::FieldChoice;

/// A form template linked to a request type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTemplate {
    /// Id of the form design as returned by the request type lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Template id from the design settings, preferred when attaching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Questions in design order.
    #[serde(default)]
    pub questions: Vec<FormQuestion>,
}

impl FormTemplate {
    /// Resolve the id to use when attaching this template to an issue.
    pub fn resolve_template_id(&self) -> Option<&str> {
        self.template_id
            .as_deref()
            .or(self.id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }
}

/// A single question of a form template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormQuestion {
    /// Question id, unique within the template.
    pub id: String,

    /// Question label.
    pub label: String,

    /// Question type code (`ts`, `cd`, `cm`, `da`, ...).
    #[serde(rename = "type")]
    pub question_type: String,

    /// Whether an answer is mandatory.
    #[serde(default)]
    pub required: bool,

    /// Choices for choice-type questions.
    #[serde(default)]
    pub choices: Vec<FieldChoice>,
}

/// An answer to a form question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormAnswer {
    /// Free-text answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Selected choice ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

impl FormAnswer {
    /// A text answer.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            choices: None,
        }
    }

    /// A choice answer.
    pub fn choices(ids: Vec<String>) -> Self {
        Self {
            text: None,
            choices: Some(ids),
        }
    }

    /// Whether the answer carries any content.
    pub fn is_empty(&self) -> bool {
        let no_text = self.text.as_deref().map_or(true, |t| t.trim().is_empty());
        let no_choices = self.choices.as_ref().map_or(true, |c| c.is_empty());
        no_text && no_choices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_template_id_prefers_template() {
        let mut form = FormTemplate {
            id: Some("design-1".into()),
            template_id: Some("42".into()),
            name: "Onboarding".into(),
            questions: Vec::new(),
        };
        assert_eq!(form.resolve_template_id(), Some("42"));

        form.template_id = None;
        assert_eq!(form.resolve_template_id(), Some("design-1"));

        form.id = Some("  ".into());
        assert_eq!(form.resolve_template_id(), None);
    }

    #[test]
    fn test_answer_serialization() {
        let json = serde_json::to_value(FormAnswer::choices(vec!["2".into()])).unwrap();
        assert_eq!(json, serde_json::json!({"choices": ["2"]}));
        assert!(FormAnswer::text(" ").is_empty());
        assert!(!FormAnswer::text("hi").is_empty());
    }
}
