//! The ticketing service seam.
//!
//! The request flow talks to Jira only through [`TicketingClient`], so tests
//! and alternative backends can stand in for [`crate::JiraClient`].

use std::collections::HashMap;

use async_trait::async_trait;
use deskbot_models::{
    AttachedForm, CreateRequest, CreatedIssue, CreatedRequest, FormAnswer, FormTemplate, Issue,
    PortalField, PortalGroup, RequestType, ServiceDesk,
};

use crate::error::Result;

/// Operations against Jira Service Management, the forms API and Jira itself.
#[async_trait]
pub trait TicketingClient: Send + Sync {
    /// List all service desks visible to the bot account.
    async fn list_service_desks(&self) -> Result<Vec<ServiceDesk>>;

    /// List portal groups of a service desk.
    async fn list_portal_groups(&self, service_desk_id: &str) -> Result<Vec<PortalGroup>>;

    /// List request types of a service desk.
    async fn list_request_types(&self, service_desk_id: &str) -> Result<Vec<RequestType>>;

    /// Fetch the portal field schema of a request type.
    async fn get_portal_fields(
        &self,
        service_desk_id: &str,
        request_type_id: &str,
    ) -> Result<Vec<PortalField>>;

    /// Fetch the form template linked to a request type, if any.
    async fn get_request_type_form(
        &self,
        service_desk_id: &str,
        request_type_id: &str,
    ) -> Result<Option<FormTemplate>>;

    /// Create a customer request.
    async fn create_request(&self, request: &CreateRequest) -> Result<CreatedRequest>;

    /// Attach a form template to an issue, returning the form instance.
    async fn attach_form(&self, issue_id: &str, template_id: &str) -> Result<AttachedForm>;

    /// Make an attached form visible on the customer portal.
    async fn set_form_external(&self, issue_id: &str, form_id: &str) -> Result<()>;

    /// Save answers into an attached form.
    async fn save_form_answers(
        &self,
        issue_id: &str,
        form_id: &str,
        answers: &HashMap<String, FormAnswer>,
    ) -> Result<()>;

    /// Customer-facing link for a request.
    fn portal_url(&self, issue_key: &str) -> String;

    /// Look up a Jira issue by key.
    async fn get_issue(&self, issue_key: &str) -> Result<Issue>;

    /// Create a plain Jira issue.
    async fn create_issue(
        &self,
        project_key: &str,
        summary: &str,
        issue_type: &str,
    ) -> Result<CreatedIssue>;
}
