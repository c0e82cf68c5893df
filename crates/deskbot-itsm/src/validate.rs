//! Field input validation and value formatting.
//!
//! [`validate_input`] turns one chat message into an [`Outcome`] for the field
//! being collected. [`portal_value`] and [`form_answer`] shape an accepted
//! value for the create-request call and the form answers respectively.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use deskbot_models::{is_empty_value, FormAnswer};
use regex::Regex;
use serde_json::{json, Value};

use crate::field::{Field, FieldKind, FieldValue, OTHER_CHOICE_ID};

/// Result of validating one message against a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Store the value and advance.
    Accept(FieldValue),
    /// "Other" was picked; ask for the custom value, remembering other picks.
    AwaitCustomValue { pending_choices: Vec<String> },
    /// Input rejected; the message explains what is expected.
    Reject(String),
}

/// `YYYY-MM-DD`.
static DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid date regex"));

/// `YYYY-MM-DD` with an optional ` HH:MM`.
static DATETIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})(?: (\d{2}:\d{2}))?$").expect("Invalid datetime regex")
});

/// Validate a message for `field`.
///
/// `custom_value` is `Some(pending choices)` while the user is typing the
/// value for a previously picked "Other" choice.
pub fn validate_input(field: &Field, input: &str, custom_value: Option<&[String]>) -> Outcome {
    let input = input.trim();

    if let Some(pending) = custom_value {
        if input.is_empty() {
            if field.required {
                return Outcome::Reject(format!("{} is required. Type a value.", field.name));
            }
            return Outcome::Accept(FieldValue::Empty);
        }
        return Outcome::Accept(FieldValue::Custom {
            text: input.to_string(),
            choices: pending.to_vec(),
        });
    }

    if input.eq_ignore_ascii_case("skip") {
        if field.required {
            return Outcome::Reject(format!("{} is required and cannot be skipped.", field.name));
        }
        return Outcome::Accept(FieldValue::Empty);
    }

    match field.kind {
        FieldKind::Attachment => Outcome::Accept(FieldValue::Empty),
        FieldKind::Select => select(field, input),
        FieldKind::MultiSelect => multi_select(field, input),
        FieldKind::Date => date(input),
        FieldKind::DateTime => datetime(input),
        FieldKind::Number => number(input),
        FieldKind::Text => {
            let blank = input.is_empty()
                || (field.is_portal() && is_empty_value(&format_portal_text(field, input)));
            if blank && field.required {
                Outcome::Reject(format!("{} is required. Enter a value.", field.name))
            } else {
                Outcome::Accept(FieldValue::Text(input.to_string()))
            }
        }
    }
}

fn range_message(count: usize) -> String {
    format!("Enter 1-{}.", count)
}

/// Parse a 1-based index into `count` entries.
pub fn parse_index(input: &str, count: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    if n >= 1 && n <= count {
        Some(n - 1)
    } else {
        None
    }
}

fn select(field: &Field, input: &str) -> Outcome {
    let count = field.valid_values.len();
    match parse_index(input, count) {
        Some(i) => {
            let choice = &field.valid_values[i];
            if choice.id == OTHER_CHOICE_ID {
                Outcome::AwaitCustomValue {
                    pending_choices: Vec::new(),
                }
            } else {
                Outcome::Accept(FieldValue::Choice(choice.id.clone()))
            }
        }
        None => Outcome::Reject(format!("Invalid choice. {}", range_message(count))),
    }
}

fn multi_select(field: &Field, input: &str) -> Outcome {
    let count = field.valid_values.len();
    let mut ids: Vec<String> = Vec::new();
    let mut wants_other = false;

    for part in input.split(',') {
        let Some(i) = parse_index(part, count) else {
            return Outcome::Reject(format!(
                "Invalid selection '{}'. Enter numbers 1-{} separated by commas.",
                part.trim(),
                count
            ));
        };
        let id = &field.valid_values[i].id;
        if id == OTHER_CHOICE_ID {
            wants_other = true;
        } else if !ids.contains(id) {
            ids.push(id.clone());
        }
    }

    if wants_other {
        Outcome::AwaitCustomValue {
            pending_choices: ids,
        }
    } else {
        Outcome::Accept(FieldValue::Choices(ids))
    }
}

fn date(input: &str) -> Outcome {
    if DATE_REGEX.is_match(input) && NaiveDate::parse_from_str(input, "%Y-%m-%d").is_ok() {
        Outcome::Accept(FieldValue::Text(input.to_string()))
    } else {
        Outcome::Reject("Invalid date. Use YYYY-MM-DD, e.g. 2024-01-15.".to_string())
    }
}

fn datetime(input: &str) -> Outcome {
    let invalid = || {
        Outcome::Reject(
            "Invalid date/time. Use YYYY-MM-DD or YYYY-MM-DD HH:MM, e.g. 2024-01-15 14:30."
                .to_string(),
        )
    };
    let Some(caps) = DATETIME_REGEX.captures(input) else {
        return invalid();
    };
    let Ok(day) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") else {
        return invalid();
    };
    let time = match caps.get(2) {
        Some(t) => match NaiveTime::parse_from_str(t.as_str(), "%H:%M") {
            Ok(time) => time,
            Err(_) => return invalid(),
        },
        None => NaiveTime::MIN,
    };
    Outcome::Accept(FieldValue::DateTime {
        text: input.to_string(),
        jira: format!("{}T{}:00.000+0000", day.format("%Y-%m-%d"), time.format("%H:%M")),
    })
}

fn number(input: &str) -> Outcome {
    match input.parse::<f64>() {
        Ok(value) if value.is_finite() => Outcome::Accept(FieldValue::Number {
            text: input.to_string(),
            value,
        }),
        _ => Outcome::Reject("Invalid number. Enter a numeric value, e.g. 42 or 3.5.".to_string()),
    }
}

fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shape free text for a portal field according to its schema.
pub fn format_portal_text(field: &Field, text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::String(String::new());
    }
    let schema = &field.schema;
    match (schema.schema_type.as_str(), schema.items.as_deref()) {
        ("user", _) => json!({ "accountId": text }),
        ("array", Some("user")) => Value::Array(
            split_list(text)
                .into_iter()
                .map(|id| json!({ "accountId": id }))
                .collect(),
        ),
        ("array", _) => json!(split_list(text)),
        ("priority", _) => json!({ "name": text }),
        ("option", _) => json!({ "value": text }),
        ("number", _) => text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(number_value)
            .unwrap_or_else(|| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

/// Value stored for a portal field.
pub fn portal_value(field: &Field, value: &FieldValue) -> Value {
    match value {
        FieldValue::Empty => Value::Null,
        FieldValue::Text(text) => format_portal_text(field, text),
        FieldValue::Number { value, .. } => number_value(*value),
        FieldValue::DateTime { jira, .. } => Value::String(jira.clone()),
        FieldValue::Choice(id) => json!({ "id": id }),
        FieldValue::Choices(ids) => {
            Value::Array(ids.iter().map(|id| json!({ "id": id })).collect())
        }
        FieldValue::Custom { text, .. } => format_portal_text(field, text),
    }
}

/// Answer stored for a form question; `None` when empty.
pub fn form_answer(value: &FieldValue) -> Option<FormAnswer> {
    let answer = match value {
        FieldValue::Empty => return None,
        FieldValue::Text(text) => FormAnswer::text(text.clone()),
        FieldValue::Number { text, .. } | FieldValue::DateTime { text, .. } => {
            FormAnswer::text(text.clone())
        }
        FieldValue::Choice(id) => FormAnswer::choices(vec![id.clone()]),
        FieldValue::Choices(ids) => FormAnswer::choices(ids.clone()),
        FieldValue::Custom { text, choices } => FormAnswer {
            text: Some(text.clone()),
            choices: if choices.is_empty() {
                None
            } else {
                Some(choices.clone())
            },
        },
    };
    if answer.is_empty() {
        None
    } else {
        Some(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::tests::{form_field, portal_field, with_choices};
    use crate::field::OTHER_CHOICE_NAME;

    fn accept(field: &Field, input: &str) -> FieldValue {
        match validate_input(field, input, None) {
            Outcome::Accept(v) => v,
            other => panic!("expected accept for '{}', got {:?}", input, other),
        }
    }

    fn reject(field: &Field, input: &str) -> String {
        match validate_input(field, input, None) {
            Outcome::Reject(msg) => msg,
            other => panic!("expected reject for '{}', got {:?}", input, other),
        }
    }

    #[test]
    fn test_skip_required_rejected() {
        let field = portal_field("summary", "Summary", "string", true);
        assert_eq!(reject(&field, "skip"), "Summary is required and cannot be skipped.");
    }

    #[test]
    fn test_skip_optional_stores_empty() {
        let field = portal_field("description", "Description", "string", false);
        assert_eq!(accept(&field, "SKIP"), FieldValue::Empty);
    }

    #[test]
    fn test_required_list_field_rejects_blank_entries() {
        let field = portal_field("labels", "Labels", "array", true);
        assert_eq!(reject(&field, ", ,"), "Labels is required. Enter a value.");
        assert_eq!(accept(&field, "vpn, ,"), FieldValue::Text("vpn, ,".into()));
        assert_eq!(format_portal_text(&field, "vpn, ,"), json!(["vpn"]));

        let optional = portal_field("labels", "Labels", "array", false);
        assert_eq!(accept(&optional, ","), FieldValue::Text(",".into()));
    }

    #[test]
    fn test_attachment_always_advances() {
        let field = portal_field("attachment", "Files", "attachment", true);
        assert_eq!(accept(&field, "here you go"), FieldValue::Empty);
    }

    #[test]
    fn test_single_choice_range() {
        let field = with_choices(
            portal_field("customfield_1", "Impact", "option", true),
            FieldKind::Select,
            &[("100", "Low")],
        );
        assert_eq!(accept(&field, "1"), FieldValue::Choice("100".into()));
        assert_eq!(reject(&field, "2"), "Invalid choice. Enter 1-1.");
        assert_eq!(reject(&field, "0"), "Invalid choice. Enter 1-1.");
        assert_eq!(reject(&field, "low"), "Invalid choice. Enter 1-1.");
    }

    #[test]
    fn test_select_other_awaits_custom_value() {
        let field = with_choices(
            form_field("3", "OS", FieldKind::Select, true),
            FieldKind::Select,
            &[("1", "Linux"), (OTHER_CHOICE_ID, OTHER_CHOICE_NAME)],
        );
        assert_eq!(
            validate_input(&field, "2", None),
            Outcome::AwaitCustomValue {
                pending_choices: Vec::new()
            }
        );
        assert_eq!(
            validate_input(&field, "  BeOS ", Some(&[])),
            Outcome::Accept(FieldValue::Custom {
                text: "BeOS".into(),
                choices: Vec::new()
            })
        );
        assert!(matches!(validate_input(&field, "", Some(&[])), Outcome::Reject(_)));
    }

    #[test]
    fn test_multiselect_all_or_nothing() {
        let field = with_choices(
            portal_field("labels", "Systems", "array", false),
            FieldKind::MultiSelect,
            &[("a", "VPN"), ("b", "Email"), ("c", "Wiki")],
        );
        assert_eq!(
            accept(&field, "1, 3"),
            FieldValue::Choices(vec!["a".into(), "c".into()])
        );
        let msg = reject(&field, "1,9");
        assert!(msg.contains("1-3"), "{}", msg);
        assert!(msg.contains("'9'"), "{}", msg);
    }

    #[test]
    fn test_multiselect_with_other() {
        let field = with_choices(
            form_field("5", "Apps", FieldKind::MultiSelect, false),
            FieldKind::MultiSelect,
            &[("1", "Slack"), ("2", "Zoom"), (OTHER_CHOICE_ID, OTHER_CHOICE_NAME)],
        );
        assert_eq!(
            validate_input(&field, "2,3", None),
            Outcome::AwaitCustomValue {
                pending_choices: vec!["2".into()]
            }
        );
    }

    #[test]
    fn test_date_round_trip() {
        let field = portal_field("duedate", "Due date", "date", false);
        assert_eq!(accept(&field, "2024-01-15"), FieldValue::Text("2024-01-15".into()));
        assert!(reject(&field, "01/15/2024").contains("YYYY-MM-DD"));
        reject(&field, "2024-02-30");
    }

    #[test]
    fn test_datetime_optional_time() {
        let field = portal_field("customfield_2", "Start", "datetime", false);
        assert_eq!(
            accept(&field, "2024-01-15 09:30"),
            FieldValue::DateTime {
                text: "2024-01-15 09:30".into(),
                jira: "2024-01-15T09:30:00.000+0000".into()
            }
        );
        assert!(matches!(accept(&field, "2024-01-15"), FieldValue::DateTime { .. }));
        reject(&field, "2024-01-15T09:30");
        reject(&field, "2024-01-15 25:00");
    }

    #[test]
    fn test_number() {
        let field = portal_field("customfield_3", "Seats", "number", true);
        assert!(matches!(accept(&field, "3.5"), FieldValue::Number { .. }));
        reject(&field, "three");
        reject(&field, "inf");
        reject(&field, "NaN");
    }

    #[test]
    fn test_required_text_empty_rejected() {
        let field = portal_field("summary", "Summary", "string", true);
        reject(&field, "   ");
        assert_eq!(accept(&field, "  VPN down "), FieldValue::Text("VPN down".into()));
    }

    #[test]
    fn test_portal_formatting() {
        let mut reporter = portal_field("reporter", "On behalf of", "user", false);
        assert_eq!(
            portal_value(&reporter, &FieldValue::Text("abc123".into())),
            json!({"accountId": "abc123"})
        );

        reporter.schema.schema_type = "array".into();
        reporter.schema.items = Some("user".into());
        assert_eq!(
            portal_value(&reporter, &FieldValue::Text("a, b".into())),
            json!([{"accountId": "a"}, {"accountId": "b"}])
        );

        let seats = portal_field("seats", "Seats", "number", false);
        assert_eq!(
            portal_value(&seats, &FieldValue::Number { text: "4".into(), value: 4.0 }),
            json!(4)
        );
        assert_eq!(
            portal_value(&seats, &FieldValue::Choices(vec!["1".into()])),
            json!([{"id": "1"}])
        );
        assert_eq!(portal_value(&seats, &FieldValue::Empty), Value::Null);
    }

    #[test]
    fn test_form_answers() {
        assert_eq!(form_answer(&FieldValue::Empty), None);
        assert_eq!(form_answer(&FieldValue::Text(String::new())), None);
        assert_eq!(
            form_answer(&FieldValue::Choice("2".into())),
            Some(FormAnswer::choices(vec!["2".into()]))
        );
        assert_eq!(
            form_answer(&FieldValue::Custom {
                text: "Teams".into(),
                choices: vec!["1".into()]
            }),
            Some(FormAnswer {
                text: Some("Teams".into()),
                choices: Some(vec!["1".into()])
            })
        );
    }
}
