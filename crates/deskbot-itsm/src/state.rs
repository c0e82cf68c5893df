//! Per-conversation request flow state.

use std::collections::HashMap;

use deskbot_models::{FormTemplate, PortalField, PortalGroup, RequestType, ServiceDesk};
use serde::{Deserialize, Serialize};

use crate::field::FieldCollection;

/// The step a conversation is at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Choosing a service desk.
    SelectServiceDesk,
    /// Choosing a portal group of the selected desk.
    SelectPortalGroup,
    /// Choosing a request type of the selected group.
    SelectRequestType,
    /// Collecting field values one at a time.
    CollectField,
    /// Waiting for submit confirmation.
    Confirm,
}

/// State of one conversation's request flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Current step.
    pub step: Step,
    /// Desks offered at the first step.
    pub service_desks: Vec<ServiceDesk>,
    /// Portal groups of the selected desk.
    pub portal_groups: Vec<PortalGroup>,
    /// All request types of the selected desk.
    pub request_types: Vec<RequestType>,
    /// Request types offered for the selected group.
    pub filtered_request_types: Vec<RequestType>,
    pub selected_service_desk: Option<ServiceDesk>,
    pub selected_portal_group: Option<PortalGroup>,
    pub selected_request_type: Option<RequestType>,
    /// Form linked to the selected request type.
    pub form_template: Option<FormTemplate>,
    /// Present from field collection onwards.
    pub field_collection: Option<FieldCollection>,
    /// Portal fields fetched while listing request types.
    pub request_type_fields_cache: HashMap<String, Vec<PortalField>>,
    /// Forms fetched while listing request types.
    pub request_type_forms_cache: HashMap<String, Option<FormTemplate>>,
}

impl ConversationState {
    /// A fresh flow offering the given desks.
    pub fn new(service_desks: Vec<ServiceDesk>) -> Self {
        Self {
            step: Step::SelectServiceDesk,
            service_desks,
            portal_groups: Vec::new(),
            request_types: Vec::new(),
            filtered_request_types: Vec::new(),
            selected_service_desk: None,
            selected_portal_group: None,
            selected_request_type: None,
            form_template: None,
            field_collection: None,
            request_type_fields_cache: HashMap::new(),
            request_type_forms_cache: HashMap::new(),
        }
    }

    /// Go back to desk selection, forgetting everything below it.
    pub fn reset_to_service_desk(&mut self) {
        self.reset_to_portal_group();
        self.step = Step::SelectServiceDesk;
        self.selected_service_desk = None;
        self.portal_groups.clear();
        self.request_types.clear();
    }

    /// Go back to group selection, forgetting everything below it.
    pub fn reset_to_portal_group(&mut self) {
        self.reset_to_request_type();
        self.step = Step::SelectPortalGroup;
        self.selected_portal_group = None;
        self.filtered_request_types.clear();
        self.request_type_fields_cache.clear();
        self.request_type_forms_cache.clear();
    }

    /// Go back to request type selection, forgetting collected values.
    pub fn reset_to_request_type(&mut self) {
        self.step = Step::SelectRequestType;
        self.selected_request_type = None;
        self.form_template = None;
        self.field_collection = None;
    }

    /// Whether the group step was skipped because the desk has no groups.
    pub fn has_portal_groups(&self) -> bool {
        !self.portal_groups.is_empty()
    }
}
