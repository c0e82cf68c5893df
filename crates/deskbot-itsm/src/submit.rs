//! Request submission.
//!
//! Creating the request is the only step that can fail the submission. The
//! form steps that follow run best-effort: each one's result is recorded in
//! the [`SubmissionReport`] and later steps are skipped only when they depend
//! on an earlier one's output.

use std::collections::HashMap;
use std::time::Duration;

use deskbot_core::TicketingClient;
use deskbot_models::{CreateRequest, CreatedRequest, FormAnswer, FormTemplate};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::field::{FieldCollection, FieldSource};
use crate::state::ConversationState;

/// One best-effort form step after the request is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStep {
    /// Find the template id of the request type's form.
    ResolveTemplate,
    /// Attach the form to the new issue.
    AttachForm,
    /// Make the attached form visible on the portal.
    SetExternal,
    /// Save the collected answers into the form.
    SaveAnswers,
}

/// A created request and how its form steps went.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    pub created: CreatedRequest,
    pub portal_url: String,
    pub elapsed: Duration,
    /// Form steps in the order they ran.
    pub form_steps: Vec<(FormStep, std::result::Result<(), String>)>,
}

impl SubmissionReport {
    /// Form steps that failed, with their error messages.
    pub fn form_failures(&self) -> impl Iterator<Item = (FormStep, &str)> + '_ {
        self.form_steps.iter().filter_map(|(step, result)| match result {
            Ok(()) => None,
            Err(e) => Some((*step, e.as_str())),
        })
    }
}

/// How a submission attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Required fields have no value; nothing was sent.
    MissingFields(Vec<String>),
    /// The request exists.
    Created(SubmissionReport),
    /// Creating the request failed.
    Failed { error: String, elapsed: Duration },
}

/// Submit the request described by `state`.
pub async fn submit(
    client: &dyn TicketingClient,
    state: &ConversationState,
    form_attach_delay: Duration,
) -> SubmitOutcome {
    let empty = FieldCollection::default();
    let collection = state.field_collection.as_ref().unwrap_or(&empty);

    let missing = collection.missing_required();
    if !missing.is_empty() {
        return SubmitOutcome::MissingFields(missing);
    }

    let started = Instant::now();
    let (Some(desk), Some(request_type)) =
        (&state.selected_service_desk, &state.selected_request_type)
    else {
        return SubmitOutcome::Failed {
            error: "no request type selected".to_string(),
            elapsed: started.elapsed(),
        };
    };

    let request = CreateRequest::new(
        desk.id.clone(),
        request_type.id.clone(),
        collection
            .collected_values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    let created = match client.create_request(&request).await {
        Ok(created) => created,
        Err(e) => {
            warn!(
                service_desk_id = %desk.id,
                request_type_id = %request_type.id,
                error = %e,
                "Create request failed"
            );
            return SubmitOutcome::Failed {
                error: e.to_string(),
                elapsed: started.elapsed(),
            };
        }
    };
    info!(
        issue_key = %created.issue_key,
        request_type_id = %request_type.id,
        fields = request.request_field_values.len(),
        "Created request"
    );

    let form_steps = match &state.form_template {
        Some(template) => {
            tokio::time::sleep(form_attach_delay).await;
            fill_form(client, &created, template, collection).await
        }
        None => Vec::new(),
    };

    SubmitOutcome::Created(SubmissionReport {
        portal_url: client.portal_url(&created.issue_key),
        created,
        elapsed: started.elapsed(),
        form_steps,
    })
}

async fn fill_form(
    client: &dyn TicketingClient,
    created: &CreatedRequest,
    template: &FormTemplate,
    collection: &FieldCollection,
) -> Vec<(FormStep, std::result::Result<(), String>)> {
    let mut steps = Vec::new();
    let mut record = |step: FormStep, result: std::result::Result<(), String>| {
        if let Err(e) = &result {
            warn!(issue_key = %created.issue_key, ?step, error = %e, "Form step failed");
        }
        steps.push((step, result));
    };

    let Some(template_id) = template.resolve_template_id() else {
        record(
            FormStep::ResolveTemplate,
            Err("form template has no id".to_string()),
        );
        return steps;
    };
    record(FormStep::ResolveTemplate, Ok(()));

    let form = match client.attach_form(&created.issue_id, template_id).await {
        Ok(form) => {
            record(FormStep::AttachForm, Ok(()));
            form
        }
        Err(e) => {
            record(FormStep::AttachForm, Err(e.to_string()));
            return steps;
        }
    };

    let external = client
        .set_form_external(&created.issue_id, &form.id)
        .await
        .map_err(|e| e.to_string());
    record(FormStep::SetExternal, external);

    let answers = merged_answers(collection);
    if !answers.is_empty() {
        let saved = client
            .save_form_answers(&created.issue_id, &form.id, &answers)
            .await
            .map_err(|e| e.to_string());
        record(FormStep::SaveAnswers, saved);
    }

    steps
}

/// Explicit form answers plus portal values for questions that share a
/// portal field's label.
pub fn merged_answers(collection: &FieldCollection) -> HashMap<String, FormAnswer> {
    let mut answers: HashMap<String, FormAnswer> = collection
        .form_answers
        .iter()
        .filter_map(|(id, answer)| answer.clone().map(|a| (id.clone(), a)))
        .collect();

    for field in &collection.fields {
        let FieldSource::Portal {
            form_question_id: Some(question_id),
        } = &field.source
        else {
            continue;
        };
        let text = collection
            .collected_values
            .get(&field.field_id)
            .and_then(|v| field.describe_value(v));
        if let Some(text) = text {
            answers
                .entry(question_id.clone())
                .or_insert_with(|| FormAnswer::text(text));
        }
    }

    answers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::tests::{form_field, portal_field};
    use crate::field::{FieldKind, FieldValue};

    #[test]
    fn test_merged_answers_cross_references_portal_values() {
        let mut manager = portal_field("customfield_9", "Manager", "string", false);
        manager.source = FieldSource::Portal {
            form_question_id: Some("7".into()),
        };
        let mut collection = FieldCollection::new(vec![
            portal_field("summary", "Summary", "string", true),
            manager,
            form_field("8", "Budget", FieldKind::Number, false),
            form_field("9", "Notes", FieldKind::Text, false),
        ]);
        collection.record(FieldValue::Text("New laptop".into()));
        collection.record(FieldValue::Text("Dana".into()));
        collection.record(FieldValue::Number {
            text: "1200".into(),
            value: 1200.0,
        });
        collection.record(FieldValue::Empty);

        let answers = merged_answers(&collection);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers["7"], FormAnswer::text("Dana"));
        assert_eq!(answers["8"], FormAnswer::text("1200"));
    }

    #[test]
    fn test_form_failures() {
        let report = SubmissionReport {
            created: CreatedRequest {
                issue_id: "1".into(),
                issue_key: "IT-1".into(),
            },
            portal_url: String::new(),
            elapsed: Duration::ZERO,
            form_steps: vec![
                (FormStep::ResolveTemplate, Ok(())),
                (FormStep::AttachForm, Ok(())),
                (FormStep::SetExternal, Err("forbidden".into())),
                (FormStep::SaveAnswers, Ok(())),
            ],
        };
        let failures: Vec<_> = report.form_failures().collect();
        assert_eq!(failures, vec![(FormStep::SetExternal, "forbidden")]);
    }
}
