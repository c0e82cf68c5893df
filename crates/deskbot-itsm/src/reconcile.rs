//! Field reconciliation.
//!
//! Merges the portal fields of a request type with the questions of its form
//! into the single ordered list collected from the user: portal fields first,
//! in upstream order, then the form questions whose label the portal does not
//! already ask for. Labels repeated across form questions become numbered
//! table rows.

use std::collections::{HashMap, HashSet};

use deskbot_models::{FieldChoice, FormQuestion, JiraSchema, PortalField};
use tracing::warn;

use crate::field::{
    Field, FieldKind, FieldSource, FORM_FIELD_PREFIX, OTHER_CHOICE_ID, OTHER_CHOICE_NAME,
};

fn label_key(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Build the collection order for a request type.
pub fn reconcile_fields(portal_fields: &[PortalField], questions: &[FormQuestion]) -> Vec<Field> {
    // First occurrence wins for repeated labels.
    let mut question_by_label: HashMap<String, &str> = HashMap::new();
    for question in questions {
        let key = label_key(&question.label);
        if !key.is_empty() {
            question_by_label.entry(key).or_insert(question.id.as_str());
        }
    }

    let mut fields = Vec::with_capacity(portal_fields.len() + questions.len());
    let mut seen_field_ids = HashSet::new();
    let mut portal_labels = HashSet::new();

    for portal in portal_fields {
        if !seen_field_ids.insert(portal.field_id.as_str()) {
            continue;
        }
        let key = label_key(&portal.name);
        let form_question_id = question_by_label.get(&key).map(|id| id.to_string());
        if !key.is_empty() {
            portal_labels.insert(key);
        }

        fields.push(Field {
            field_id: portal.field_id.clone(),
            name: portal.name.clone(),
            description: portal.description.clone(),
            required: portal.required,
            visible: portal.visible,
            valid_values: portal.valid_values.clone(),
            schema: portal.jira_schema.clone(),
            kind: FieldKind::for_portal(&portal.jira_schema, !portal.valid_values.is_empty()),
            source: FieldSource::Portal { form_question_id },
        });
    }

    let mut seen_questions = HashSet::new();
    let form_only: Vec<&FormQuestion> = questions
        .iter()
        .filter(|q| !portal_labels.contains(&label_key(&q.label)))
        .filter(|q| seen_questions.insert(q.id.as_str()))
        .filter(|q| {
            let taken = seen_field_ids.contains(form_field_id(&q.id).as_str());
            if taken {
                warn!(question_id = %q.id, "Form question id collides with a portal field");
            }
            !taken
        })
        .collect();

    let mut label_counts: HashMap<String, u32> = HashMap::new();
    for question in &form_only {
        *label_counts.entry(label_key(&question.label)).or_default() += 1;
    }

    let mut rows: HashMap<String, u32> = HashMap::new();

    for question in form_only {
        let key = label_key(&question.label);
        let is_table_field = label_counts.get(&key).copied().unwrap_or(0) > 1;

        let (name, row_number) = if is_table_field {
            let row = rows.entry(key).or_default();
            *row += 1;
            (format!("{} (Row {})", question.label.trim(), row), Some(*row))
        } else {
            (question.label.trim().to_string(), None)
        };

        let valid_values = question_choices(&question.choices);
        let kind = FieldKind::for_question(&question.question_type, !valid_values.is_empty());

        fields.push(Field {
            field_id: form_field_id(&question.id),
            name,
            description: String::new(),
            required: question.required,
            visible: true,
            valid_values,
            schema: JiraSchema {
                schema_type: question.question_type.clone(),
                ..JiraSchema::default()
            },
            kind,
            source: FieldSource::Form {
                question_id: question.id.clone(),
                is_table_field,
                row_number,
            },
        });
    }

    fields
}

fn form_field_id(question_id: &str) -> String {
    format!("{}{}", FORM_FIELD_PREFIX, question_id)
}

/// Choices shown for a form question: upstream "other" entries replaced by
/// the synthetic custom-value choice.
fn question_choices(choices: &[FieldChoice]) -> Vec<FieldChoice> {
    let mut values: Vec<FieldChoice> = choices
        .iter()
        .filter(|c| !c.name.trim().to_lowercase().starts_with("other"))
        .cloned()
        .collect();
    if !values.is_empty() {
        values.push(FieldChoice::new(OTHER_CHOICE_ID, OTHER_CHOICE_NAME));
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal(id: &str, name: &str) -> PortalField {
        PortalField {
            field_id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            required: false,
            visible: true,
            valid_values: Vec::new(),
            jira_schema: JiraSchema {
                schema_type: "string".into(),
                ..JiraSchema::default()
            },
        }
    }

    fn question(id: &str, label: &str, code: &str, choices: &[&str]) -> FormQuestion {
        FormQuestion {
            id: id.to_string(),
            label: label.to_string(),
            question_type: code.to_string(),
            required: false,
            choices: choices
                .iter()
                .enumerate()
                .map(|(i, c)| FieldChoice::new((i + 1).to_string(), *c))
                .collect(),
        }
    }

    #[test]
    fn test_portal_first_then_form_only() {
        let fields = reconcile_fields(
            &[portal("summary", "Summary"), portal("description", "Description")],
            &[question("1", "Manager", "ts", &[]), question("2", "Cost centre", "ts", &[])],
        );
        let ids: Vec<_> = fields.iter().map(|f| f.field_id.as_str()).collect();
        assert_eq!(ids, vec!["summary", "description", "form_1", "form_2"]);
        assert!(fields[0].is_portal());
        assert!(!fields[2].is_portal());
    }

    #[test]
    fn test_duplicate_label_suppressed_and_cross_referenced() {
        let fields = reconcile_fields(
            &[portal("summary", "Summary"), portal("customfield_1", " Manager ")],
            &[question("7", "manager", "ts", &[]), question("8", "Budget", "no", &[])],
        );
        assert_eq!(fields.len(), 3);
        assert_eq!(
            fields[1].source,
            FieldSource::Portal {
                form_question_id: Some("7".into())
            }
        );
        assert_eq!(fields[0].form_question_id(), None);
        assert_eq!(fields[2].name, "Budget");
        assert_eq!(fields[2].kind, FieldKind::Number);
    }

    #[test]
    fn test_first_question_wins_for_cross_reference() {
        let fields = reconcile_fields(
            &[portal("email", "Email")],
            &[question("1", "Email", "te", &[]), question("2", "EMAIL", "te", &[])],
        );
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].form_question_id(), Some("1"));
    }

    #[test]
    fn test_repeated_labels_become_table_rows() {
        let fields = reconcile_fields(
            &[],
            &[
                question("1", "Email", "te", &[]),
                question("2", "Name", "ts", &[]),
                question("3", "Email", "te", &[]),
                question("4", "email", "te", &[]),
            ],
        );
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Email (Row 1)", "Name", "Email (Row 2)", "email (Row 3)"]);
        assert_eq!(
            fields[2].source,
            FieldSource::Form {
                question_id: "3".into(),
                is_table_field: true,
                row_number: Some(2),
            }
        );
        assert_eq!(
            fields[1].source,
            FieldSource::Form {
                question_id: "2".into(),
                is_table_field: false,
                row_number: None,
            }
        );
    }

    #[test]
    fn test_other_choices_replaced() {
        let fields = reconcile_fields(
            &[],
            &[question("1", "OS", "cd", &["Linux", "macOS", "Other (please specify)"])],
        );
        let choices: Vec<_> = fields[0].valid_values.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(choices, vec!["1", "2", OTHER_CHOICE_ID]);
        assert_eq!(fields[0].valid_values[2].name, OTHER_CHOICE_NAME);
        assert_eq!(fields[0].kind, FieldKind::Select);
    }

    #[test]
    fn test_only_other_choices_leaves_text_field() {
        let fields = reconcile_fields(&[], &[question("1", "Notes", "cd", &["Other"])]);
        assert!(fields[0].valid_values.is_empty());
        assert_eq!(fields[0].kind, FieldKind::Text);
    }

    #[test]
    fn test_field_ids_unique() {
        let fields = reconcile_fields(
            &[portal("summary", "Summary"), portal("summary", "Summary again")],
            &[question("1", "A", "ts", &[]), question("1", "A", "ts", &[])],
        );
        let mut ids: Vec<_> = fields.iter().map(|f| f.field_id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_form_id_colliding_with_portal_id_is_dropped() {
        let fields = reconcile_fields(
            &[portal("form_7", "Legacy form field")],
            &[question("7", "Manager", "ts", &[]), question("8", "Budget", "no", &[])],
        );
        let ids: Vec<_> = fields.iter().map(|f| f.field_id.as_str()).collect();
        assert_eq!(ids, vec!["form_7", "form_8"]);
        assert!(fields[0].is_portal());
        assert_eq!(fields[1].name, "Budget");
    }
}
