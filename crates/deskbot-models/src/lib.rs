//! Core data models for Deskbot.
//!
//! This crate provides the data types shared between the Jira client, the
//! ITSM request flow and the chat front-ends: service desks, request types,
//! portal fields, form templates and the request/issue payloads.

pub mod form;
pub mod issue;
pub mod request;
pub mod servicedesk;

// Re-export main types
pub use form::{FormAnswer, FormQuestion, FormTemplate};
pub use issue::{CreatedIssue, Issue};
pub use request::{is_empty_value, AttachedForm, CreateRequest, CreatedRequest};
pub use servicedesk::{FieldChoice, JiraSchema, PortalField, PortalGroup, RequestType, ServiceDesk};
