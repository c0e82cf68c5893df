//! Prompt text for the request flow.
//!
//! Messages use the small HTML subset Telegram accepts (`<b>`, `<i>`,
//! `<code>`, `<a>`); all upstream text is escaped.

use std::fmt::Write as _;
use std::time::Duration;

use deskbot_models::{PortalGroup, RequestType, ServiceDesk};

use crate::field::{Field, FieldCollection, FieldKind};
use crate::reconcile::reconcile_fields;
use crate::state::ConversationState;
use crate::submit::{FormStep, SubmissionReport};

const NAV_HINT: &str = "Reply <code>back</code> to go back or <code>cancel</code> to stop.";

/// Escape HTML special characters for Telegram HTML mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn service_desks_prompt(desks: &[ServiceDesk]) -> String {
    let mut text = String::from("🗂 <b>Select a service desk</b>\n\n");
    for (i, desk) in desks.iter().enumerate() {
        let _ = writeln!(
            text,
            "{}. {} (<code>{}</code>)",
            i + 1,
            html_escape(&desk.project_name),
            html_escape(&desk.project_key)
        );
    }
    text.push_str("\nReply with a number or project key, or <code>cancel</code> to stop.");
    text
}

pub fn portal_groups_prompt(desk: &ServiceDesk, groups: &[PortalGroup]) -> String {
    let mut text = format!(
        "📂 <b>{}</b> - what is your request about?\n\n",
        html_escape(&desk.project_name)
    );
    for (i, group) in groups.iter().enumerate() {
        let _ = writeln!(text, "{}. {}", i + 1, html_escape(&group.name));
    }
    let _ = write!(text, "\nReply with a number. {}", NAV_HINT);
    text
}

/// Number of fields a request type will ask for, if its fields are cached.
fn field_count(state: &ConversationState, request_type: &RequestType) -> Option<usize> {
    let portal = state.request_type_fields_cache.get(&request_type.id)?;
    let visible: Vec<_> = portal.iter().filter(|f| f.visible).cloned().collect();
    let questions = state
        .request_type_forms_cache
        .get(&request_type.id)
        .and_then(|f| f.as_ref())
        .map(|f| f.questions.as_slice())
        .unwrap_or_default();
    Some(reconcile_fields(&visible, questions).len())
}

pub fn request_types_prompt(state: &ConversationState) -> String {
    let heading = state
        .selected_portal_group
        .as_ref()
        .map(|g| g.name.clone())
        .or_else(|| state.selected_service_desk.as_ref().map(|d| d.project_name.clone()))
        .unwrap_or_default();

    let mut text = format!("📝 <b>{}</b> - choose a request type\n\n", html_escape(&heading));
    for (i, request_type) in state.filtered_request_types.iter().enumerate() {
        let _ = write!(text, "{}. {}", i + 1, html_escape(&request_type.name));
        match field_count(state, request_type) {
            Some(0) => text.push_str(" <i>(no fields)</i>"),
            Some(1) => text.push_str(" <i>(1 field)</i>"),
            Some(n) => {
                let _ = write!(text, " <i>({} fields)</i>", n);
            }
            None => {}
        }
        if state.request_type_forms_cache.get(&request_type.id).is_some_and(|f| f.is_some()) {
            text.push_str(" 📋");
        }
        text.push('\n');
        let description = request_type.description.trim();
        if !description.is_empty() {
            let _ = writeln!(text, "   <i>{}</i>", html_escape(description));
        }
    }
    let _ = write!(text, "\nReply with a number. {}", NAV_HINT);
    text
}

fn kind_hint(field: &Field) -> &'static str {
    match field.kind {
        FieldKind::Select => "Reply with a number.",
        FieldKind::MultiSelect => "Reply with numbers separated by commas, e.g. <code>1,3</code>.",
        FieldKind::Date => "Format: <code>YYYY-MM-DD</code>.",
        FieldKind::DateTime => "Format: <code>YYYY-MM-DD</code> or <code>YYYY-MM-DD HH:MM</code>.",
        FieldKind::Number => "Enter a number.",
        FieldKind::Attachment => {
            "Attachments can't be added via chat - send any message to continue."
        }
        FieldKind::Text => match field.schema.schema_type.as_str() {
            "user" => "Enter the user's account id.",
            "array" => "Enter values separated by commas.",
            _ => "Enter a value.",
        },
    }
}

/// Summary of the values collected so far, or `None` before the first one.
pub fn recap(collection: &FieldCollection) -> Option<String> {
    let done = collection.current_field_index.min(collection.fields.len());
    if done == 0 {
        return None;
    }
    let mut text = String::from("<b>So far:</b>\n");
    for field in &collection.fields[..done] {
        let value = collection
            .describe(field)
            .map(|v| html_escape(&v))
            .unwrap_or_else(|| "<i>skipped</i>".to_string());
        let _ = writeln!(text, "• {}: {}", html_escape(&field.name), value);
    }
    Some(text)
}

pub fn field_prompt(collection: &FieldCollection) -> String {
    let Some(field) = collection.current_field() else {
        return String::new();
    };

    let mut text = format!(
        "✏️ Field {} of {}: <b>{}</b>",
        collection.current_field_index + 1,
        collection.fields.len(),
        html_escape(&field.name)
    );
    text.push_str(if field.required { " <i>(required)</i>\n" } else { " <i>(optional)</i>\n" });

    let description = field.description.trim();
    if !description.is_empty() {
        let _ = writeln!(text, "<i>{}</i>", html_escape(description));
    }

    if matches!(field.kind, FieldKind::Select | FieldKind::MultiSelect) {
        text.push('\n');
        for (i, choice) in field.valid_values.iter().enumerate() {
            let _ = writeln!(text, "{}. {}", i + 1, html_escape(&choice.name));
        }
    }

    let _ = write!(text, "\n{}", kind_hint(field));
    if !field.required {
        text.push_str(" Reply <code>skip</code> to leave it empty.");
    }
    let _ = write!(text, "\n{}", NAV_HINT);
    text
}

/// Recap followed by the prompt for the current field.
pub fn field_prompt_with_recap(collection: &FieldCollection) -> String {
    match recap(collection) {
        Some(recap) => format!("{}\n{}", recap, field_prompt(collection)),
        None => field_prompt(collection),
    }
}

pub fn custom_value_prompt(field: &Field) -> String {
    format!(
        "Type your own value for <b>{}</b>.\nReply <code>back</code> to pick from the list again.",
        html_escape(&field.name)
    )
}

pub fn confirm_prompt(state: &ConversationState) -> String {
    let mut text = String::from("📋 <b>Ready to submit</b>\n\n");
    if let Some(desk) = &state.selected_service_desk {
        let _ = writeln!(text, "Service desk: {}", html_escape(&desk.project_name));
    }
    if let Some(request_type) = &state.selected_request_type {
        let _ = writeln!(text, "Request type: {}", html_escape(&request_type.name));
    }

    if let Some(collection) = &state.field_collection {
        if !collection.fields.is_empty() {
            text.push('\n');
        }
        for field in &collection.fields {
            let value = collection
                .describe(field)
                .map(|v| html_escape(&v))
                .unwrap_or_else(|| "<i>empty</i>".to_string());
            let _ = writeln!(text, "• {}: {}", html_escape(&field.name), value);
        }
    }

    text.push_str(
        "\nSubmit this request? Reply <code>yes</code> to submit, <code>no</code> to discard \
         or <code>back</code> to edit.",
    );
    text
}

pub fn invalid_selection(count: usize, accepts_key: bool) -> String {
    if count == 0 {
        return "Nothing to select here. Reply <code>back</code> or <code>cancel</code>."
            .to_string();
    }
    if accepts_key {
        format!("❌ Invalid selection. Enter 1-{} or a project key.", count)
    } else {
        format!("❌ Invalid selection. Enter 1-{}.", count)
    }
}

pub fn missing_fields(names: &[String]) -> String {
    let list: Vec<String> = names.iter().map(|n| format!("• {}", html_escape(n))).collect();
    format!(
        "❌ Required fields are missing:\n{}\n\nReply <code>back</code> to fill them in.",
        list.join("\n")
    )
}

fn seconds(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

fn step_label(step: FormStep) -> &'static str {
    match step {
        FormStep::ResolveTemplate => "resolve form template",
        FormStep::AttachForm => "attach form",
        FormStep::SetExternal => "share form on portal",
        FormStep::SaveAnswers => "save form answers",
    }
}

pub fn submission_success(report: &SubmissionReport) -> String {
    let mut text = format!(
        "✅ Request <b>{}</b> created in {}.\n<a href=\"{}\">View it on the portal</a>",
        html_escape(&report.created.issue_key),
        seconds(report.elapsed),
        html_escape(&report.portal_url)
    );
    for (step, error) in report.form_failures() {
        let _ = write!(
            text,
            "\n⚠️ Could not {}: {}",
            step_label(step),
            html_escape(error)
        );
    }
    text
}

pub fn submission_failure(error: &str, elapsed: Duration) -> String {
    format!(
        "❌ Failed to create the request after {}: {}\n\nReply <code>retry</code> to try again or \
         <code>back</code> to edit.",
        seconds(elapsed),
        html_escape(error)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::tests::{portal_field, with_choices};
    use crate::field::FieldValue;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>A & B</b>"), "&lt;b&gt;A &amp; B&lt;/b&gt;");
    }

    #[test]
    fn test_field_prompt_lists_choices() {
        let collection = FieldCollection::new(vec![with_choices(
            portal_field("priority", "Priority", "priority", false),
            FieldKind::Select,
            &[("1", "High"), ("2", "Low")],
        )]);
        let text = field_prompt(&collection);
        assert!(text.contains("Field 1 of 1"));
        assert!(text.contains("1. High\n2. Low"));
        assert!(text.contains("skip"));
    }

    #[test]
    fn test_recap_shows_collected_values() {
        let mut collection = FieldCollection::new(vec![
            portal_field("summary", "Summary", "string", true),
            portal_field("description", "Description", "string", false),
            portal_field("duedate", "Due", "date", false),
        ]);
        assert!(recap(&collection).is_none());

        collection.record(FieldValue::Text("VPN <down>".into()));
        collection.record(FieldValue::Empty);
        let text = recap(&collection).unwrap();
        assert!(text.contains("Summary: VPN &lt;down&gt;"));
        assert!(text.contains("Description: <i>skipped</i>"));
        assert!(!text.contains("Due"));
    }

    #[test]
    fn test_invalid_selection_range() {
        assert_eq!(invalid_selection(3, false), "❌ Invalid selection. Enter 1-3.");
        assert!(invalid_selection(2, true).contains("project key"));
    }
}
