//! Jira REST client.
//!
//! Implements [`TicketingClient`] against three APIs:
//! - Jira Service Management (`/rest/servicedeskapi`) for desks, request types,
//!   portal fields and request creation
//! - the Forms API (`api.atlassian.com/jira/forms/cloud/{cloudId}`) for form
//!   templates and answers
//! - the Jira platform API (`/rest/api/3`) for plain issues

use std::collections::HashMap;

use async_trait::async_trait;
use deskbot_models::{
    AttachedForm, CreateRequest, CreatedIssue, CreatedRequest, FieldChoice, FormAnswer,
    FormQuestion, FormTemplate, Issue, PortalField, PortalGroup, RequestType, ServiceDesk,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::DeskbotConfig;
use crate::error::{CoreError, Result};
use crate::ticketing::TicketingClient;

/// Forms API host.
const FORMS_API_BASE: &str = "https://api.atlassian.com/jira/forms/cloud/";

/// Page size for paged service desk listings.
const PAGE_LIMIT: usize = 50;

/// Upper bound on pages fetched for one listing.
const MAX_PAGES: usize = 40;

/// Jira REST client using basic auth.
#[derive(Clone)]
pub struct JiraClient {
    client: reqwest::Client,
    base_url: Url,
    portal_base_url: Url,
    forms_base_url: Option<Url>,
    email: String,
    api_token: String,
}

impl JiraClient {
    /// Create a client from loaded configuration.
    pub fn new(config: &DeskbotConfig) -> Result<Self> {
        let forms_base_url = match &config.jira_cloud_id {
            Some(cloud_id) => Some(Url::parse(FORMS_API_BASE)?.join(&format!("{}/", cloud_id))?),
            None => None,
        };
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.jira_base_url.clone(),
            portal_base_url: config.portal_base_url.clone(),
            forms_base_url,
            email: config.jira_email.clone(),
            api_token: config.jira_api_token.clone(),
        })
    }

    /// Whether the forms API is configured.
    pub fn has_forms(&self) -> bool {
        self.forms_base_url.is_some()
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        trace!(method = %method, url = %url, "Jira request");
        self.client
            .request(method, url)
            .basic_auth(&self.email, Some(&self.api_token))
            .header("Accept", "application/json")
    }

    fn jira_url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn forms_url(&self, path: &str) -> Result<Url> {
        let base = self.forms_base_url.as_ref().ok_or_else(|| {
            CoreError::Configuration("JIRA_CLOUD_ID is not set; forms are unavailable".to_string())
        })?;
        Ok(base.join(path)?)
    }

    fn forms_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self
            .request(method, self.forms_url(path)?)
            .header("X-ExperimentalApi", "opt-in"))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = check(self.request(Method::GET, url).send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| CoreError::ResponseParse(e.to_string()))
    }

    /// Fetch every page of a `servicedeskapi` listing.
    async fn get_paged<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut start = 0;

        for _ in 0..MAX_PAGES {
            let mut url = self.jira_url(path)?;
            url.query_pairs_mut()
                .append_pair("start", &start.to_string())
                .append_pair("limit", &PAGE_LIMIT.to_string());

            let page: Page<T> = self.get_json(url).await?;
            let count = page.values.len();
            items.extend(page.values);

            if page.is_last_page || count == 0 {
                return Ok(items);
            }
            start += count;
        }

        warn!(path = %path, count = items.len(), "Listing truncated after page limit");
        Ok(items)
    }
}

/// Turn a non-success response into [`CoreError::Api`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CoreError::Api {
        status: status.as_u16(),
        message: error_message(status, &body),
    })
}

/// Extract a readable message from a Jira error body.
fn error_message(status: StatusCode, body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            trimmed.to_string()
        };
    };

    let mut parts: Vec<String> = Vec::new();
    if let Some(msg) = value.get("errorMessage").and_then(Value::as_str) {
        parts.push(msg.to_string());
    }
    if let Some(msgs) = value.get("errorMessages").and_then(Value::as_array) {
        parts.extend(msgs.iter().filter_map(Value::as_str).map(str::to_string));
    }
    if let Some(errors) = value.get("errors").and_then(Value::as_object) {
        parts.extend(
            errors
                .iter()
                .map(|(field, msg)| format!("{}: {}", field, msg.as_str().unwrap_or_default())),
        );
    }
    if let Some(msg) = value.get("message").and_then(Value::as_str) {
        parts.push(msg.to_string());
    }

    if parts.is_empty() {
        body.trim().to_string()
    } else {
        parts.join("; ")
    }
}

/// One page of a `servicedeskapi` listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    #[serde(default = "default_last_page")]
    is_last_page: bool,
}

fn default_last_page() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestTypeFields {
    #[serde(default)]
    request_type_fields: Vec<PortalField>,
}

/// Request type form as returned by the forms API.
#[derive(Debug, Deserialize)]
struct FormResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    design: Option<FormDesign>,
}

#[derive(Debug, Deserialize)]
struct FormDesign {
    #[serde(default)]
    settings: Option<FormSettings>,
    #[serde(default)]
    questions: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormSettings {
    #[serde(default)]
    template_id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    label: String,
    #[serde(rename = "type", default)]
    question_type: String,
    #[serde(default)]
    validation: Option<RawValidation>,
    #[serde(default)]
    choices: Vec<FieldChoice>,
}

#[derive(Debug, Deserialize)]
struct RawValidation {
    #[serde(default)]
    rq: bool,
}

fn id_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Convert a forms API design into a [`FormTemplate`], keeping question order.
fn parse_form(response: FormResponse) -> FormTemplate {
    let (settings, questions) = match response.design {
        Some(design) => (design.settings, design.questions),
        None => (None, Map::new()),
    };
    let (template_id, name) = match settings {
        Some(s) => (id_string(s.template_id), s.name.unwrap_or_default()),
        None => (None, String::new()),
    };

    let questions = questions
        .into_iter()
        .filter_map(|(id, raw)| match serde_json::from_value::<RawQuestion>(raw) {
            Ok(q) => Some(FormQuestion {
                id,
                label: q.label,
                question_type: q.question_type,
                required: q.validation.map(|v| v.rq).unwrap_or(false),
                choices: q.choices,
            }),
            Err(e) => {
                warn!(question_id = %id, error = %e, "Skipping unparseable form question");
                None
            }
        })
        .collect();

    FormTemplate {
        id: id_string(response.id),
        template_id,
        name,
        questions,
    }
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    status: Option<Named>,
    issuetype: Option<Named>,
    assignee: Option<Person>,
    priority: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    display_name: String,
}

impl From<IssueResponse> for Issue {
    fn from(r: IssueResponse) -> Self {
        Issue {
            key: r.key,
            summary: r.fields.summary,
            status: r.fields.status.map(|s| s.name).unwrap_or_default(),
            issue_type: r.fields.issuetype.map(|t| t.name).unwrap_or_default(),
            assignee: r.fields.assignee.map(|a| a.display_name),
            priority: r.fields.priority.map(|p| p.name),
        }
    }
}

#[async_trait]
impl TicketingClient for JiraClient {
    async fn list_service_desks(&self) -> Result<Vec<ServiceDesk>> {
        let desks = self.get_paged("rest/servicedeskapi/servicedesk").await?;
        debug!(count = desks.len(), "Listed service desks");
        Ok(desks)
    }

    async fn list_portal_groups(&self, service_desk_id: &str) -> Result<Vec<PortalGroup>> {
        self.get_paged(&format!(
            "rest/servicedeskapi/servicedesk/{}/requesttypegroup",
            service_desk_id
        ))
        .await
    }

    async fn list_request_types(&self, service_desk_id: &str) -> Result<Vec<RequestType>> {
        self.get_paged(&format!(
            "rest/servicedeskapi/servicedesk/{}/requesttype",
            service_desk_id
        ))
        .await
    }

    async fn get_portal_fields(
        &self,
        service_desk_id: &str,
        request_type_id: &str,
    ) -> Result<Vec<PortalField>> {
        let url = self.jira_url(&format!(
            "rest/servicedeskapi/servicedesk/{}/requesttype/{}/field",
            service_desk_id, request_type_id
        ))?;
        let fields: RequestTypeFields = self.get_json(url).await?;
        Ok(fields.request_type_fields)
    }

    async fn get_request_type_form(
        &self,
        service_desk_id: &str,
        request_type_id: &str,
    ) -> Result<Option<FormTemplate>> {
        if !self.has_forms() {
            debug!("Forms API not configured, skipping form lookup");
            return Ok(None);
        }

        let response = self
            .forms_request(
                Method::GET,
                &format!(
                    "servicedesk/{}/requesttype/{}/form",
                    service_desk_id, request_type_id
                ),
            )?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let form: FormResponse = check(response)
            .await?
            .json()
            .await
            .map_err(|e| CoreError::ResponseParse(e.to_string()))?;
        let template = parse_form(form);

        if template.questions.is_empty() && template.resolve_template_id().is_none() {
            return Ok(None);
        }
        Ok(Some(template))
    }

    async fn create_request(&self, request: &CreateRequest) -> Result<CreatedRequest> {
        let url = self.jira_url("rest/servicedeskapi/request")?;
        let response = check(self.request(Method::POST, url).json(request).send().await?).await?;
        let created: CreatedRequest = response
            .json()
            .await
            .map_err(|e| CoreError::ResponseParse(e.to_string()))?;
        debug!(issue_key = %created.issue_key, "Request created");
        Ok(created)
    }

    async fn attach_form(&self, issue_id: &str, template_id: &str) -> Result<AttachedForm> {
        let body = json!({ "formTemplate": { "id": template_id } });
        let response = check(
            self.forms_request(Method::POST, &format!("issue/{}/form", issue_id))?
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| CoreError::ResponseParse(e.to_string()))?;
        let id = id_string(value.get("id").cloned())
            .ok_or_else(|| CoreError::ResponseParse("attached form has no id".to_string()))?;
        Ok(AttachedForm { id })
    }

    async fn set_form_external(&self, issue_id: &str, form_id: &str) -> Result<()> {
        check(
            self.forms_request(
                Method::PUT,
                &format!("issue/{}/form/{}/action/external", issue_id, form_id),
            )?
            .send()
            .await?,
        )
        .await?;
        Ok(())
    }

    async fn save_form_answers(
        &self,
        issue_id: &str,
        form_id: &str,
        answers: &HashMap<String, FormAnswer>,
    ) -> Result<()> {
        let body = json!({ "answers": answers });
        check(
            self.forms_request(Method::PUT, &format!("issue/{}/form/{}", issue_id, form_id))?
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    fn portal_url(&self, issue_key: &str) -> String {
        self.portal_base_url
            .join(&format!("browse/{}", issue_key))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}browse/{}", self.portal_base_url, issue_key))
    }

    async fn get_issue(&self, issue_key: &str) -> Result<Issue> {
        let mut url = self.jira_url(&format!("rest/api/3/issue/{}", issue_key))?;
        url.query_pairs_mut()
            .append_pair("fields", "summary,status,assignee,priority,issuetype");
        let issue: IssueResponse = self.get_json(url).await?;
        Ok(issue.into())
    }

    async fn create_issue(
        &self,
        project_key: &str,
        summary: &str,
        issue_type: &str,
    ) -> Result<CreatedIssue> {
        let body = json!({
            "fields": {
                "project": { "key": project_key },
                "summary": summary,
                "issuetype": { "name": issue_type },
            }
        });
        let url = self.jira_url("rest/api/3/issue")?;
        let response = check(self.request(Method::POST, url).json(&body).send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| CoreError::ResponseParse(e.to_string()))
    }
}
