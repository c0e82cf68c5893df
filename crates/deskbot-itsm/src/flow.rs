//! The request-creation state machine.
//!
//! [`RequestFlow`] owns the conversation store and drives one conversation
//! per message: load the state, run the handler for its [`Step`], then save,
//! keep or delete the state depending on the [`Transition`] the handler
//! returns. Handling of one conversation is serialized by
//! [`ConversationLocks`].

use std::sync::Arc;
use std::time::Duration;

use deskbot_core::{DeskbotConfig, TicketingClient};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::field::FieldCollection;
use crate::reconcile::reconcile_fields;
use crate::render;
use crate::state::{ConversationState, Step};
use crate::store::{ConversationLocks, ConversationStore};
use crate::submit::{self, SubmitOutcome};
use crate::transport::{ChatTransport, TypingIndicator};
use crate::validate::{parse_index, validate_input, Outcome};

/// Messages that start a request.
const ENTRY_COMMANDS: &[&str] = &["create request", "itsm create"];

/// Whether a message starts a request.
pub fn is_entry_command(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    ENTRY_COMMANDS.contains(&text.as_str())
}

/// Navigation commands understood at every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Back,
    Cancel,
    Input,
}

impl Command {
    fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "back" => Command::Back,
            "cancel" => Command::Cancel,
            _ => Command::Input,
        }
    }
}

/// What happens to the stored state after a message.
enum Transition {
    Save(ConversationState),
    Unchanged,
    Delete,
}

/// Timing knobs of the flow.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    /// Wait between creating a request and attaching its form.
    pub form_attach_delay: Duration,
    /// Typing indicator refresh period during submission.
    pub typing_interval: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            form_attach_delay: Duration::from_millis(3000),
            typing_interval: Duration::from_secs(4),
        }
    }
}

impl FlowSettings {
    pub fn from_config(config: &DeskbotConfig) -> Self {
        Self {
            form_attach_delay: config.form_attach_delay,
            typing_interval: config.typing_interval,
        }
    }
}

/// Drives request-creation conversations.
pub struct RequestFlow {
    client: Arc<dyn TicketingClient>,
    store: Arc<dyn ConversationStore>,
    locks: ConversationLocks,
    settings: FlowSettings,
}

impl RequestFlow {
    /// Create a flow backed by `client` and `store`.
    pub fn new(
        client: Arc<dyn TicketingClient>,
        store: Arc<dyn ConversationStore>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            client,
            store,
            locks: ConversationLocks::new(),
            settings,
        }
    }

    /// Whether a conversation is in the middle of a request.
    pub async fn is_active(&self, conversation_id: &str) -> Result<bool> {
        Ok(self.store.get(conversation_id).await?.is_some())
    }

    /// Start (or restart) a request in a conversation.
    pub async fn start(
        &self,
        conversation_id: &str,
        transport: &Arc<dyn ChatTransport>,
    ) -> Result<()> {
        let _guard = self.locks.acquire(conversation_id).await;
        self.start_locked(conversation_id, transport).await
    }

    /// Abandon the request of a conversation. Returns whether one existed.
    pub async fn cancel(
        &self,
        conversation_id: &str,
        transport: &Arc<dyn ChatTransport>,
    ) -> Result<bool> {
        let _guard = self.locks.acquire(conversation_id).await;
        let existed = self.store.delete(conversation_id).await?;
        if existed {
            info!(conversation_id = %conversation_id, "Request flow cancelled");
            transport.send_text("🚫 Request cancelled.").await?;
        }
        Ok(existed)
    }

    /// Handle one message. Returns `false` when the message is not part of a
    /// request flow and the host should handle it.
    pub async fn handle_message(
        &self,
        conversation_id: &str,
        text: &str,
        transport: &Arc<dyn ChatTransport>,
    ) -> Result<bool> {
        let _guard = self.locks.acquire(conversation_id).await;

        let Some(state) = self.store.get(conversation_id).await? else {
            if is_entry_command(text) {
                self.start_locked(conversation_id, transport).await?;
                return Ok(true);
            }
            return Ok(false);
        };

        let input = text.trim();
        let command = Command::parse(input);
        debug!(
            conversation_id = %conversation_id,
            step = ?state.step,
            ?command,
            "Request flow message"
        );

        let transition = if command == Command::Cancel {
            info!(conversation_id = %conversation_id, "Request flow cancelled");
            transport.send_text("🚫 Request cancelled.").await?;
            Transition::Delete
        } else {
            match state.step {
                Step::SelectServiceDesk => {
                    self.on_service_desk(state, input, command, transport).await?
                }
                Step::SelectPortalGroup => {
                    self.on_portal_group(state, input, command, transport).await?
                }
                Step::SelectRequestType => {
                    self.on_request_type(state, input, command, transport).await?
                }
                Step::CollectField => on_collect_field(state, input, command, transport).await?,
                Step::Confirm => {
                    self.on_confirm(state, conversation_id, input, command, transport)
                        .await?
                }
            }
        };

        match transition {
            Transition::Save(state) => self.store.set(conversation_id, state).await?,
            Transition::Unchanged => {}
            Transition::Delete => {
                self.store.delete(conversation_id).await?;
            }
        }
        Ok(true)
    }

    /// Drop conversations idle longer than `max_idle`.
    pub async fn purge_idle(&self, max_idle: Duration) -> Result<usize> {
        let purged = self.store.purge_idle(max_idle).await?;
        self.locks.prune().await;
        if purged > 0 {
            info!(purged, "Purged idle request flows");
        }
        Ok(purged)
    }

    async fn start_locked(
        &self,
        conversation_id: &str,
        transport: &Arc<dyn ChatTransport>,
    ) -> Result<()> {
        show_typing(transport).await;

        let desks = match self.client.list_service_desks().await {
            Ok(desks) => desks,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Failed to list service desks");
                transport
                    .send_text(&format!(
                        "❌ Failed to load service desks: {}",
                        render::html_escape(&e.to_string())
                    ))
                    .await?;
                return Ok(());
            }
        };

        if desks.is_empty() {
            self.store.delete(conversation_id).await?;
            transport
                .send_text("No service desks are available to this bot.")
                .await?;
            return Ok(());
        }

        info!(
            conversation_id = %conversation_id,
            desks = desks.len(),
            "Started request flow"
        );
        transport
            .send_text(&render::service_desks_prompt(&desks))
            .await?;
        self.store
            .set(conversation_id, ConversationState::new(desks))
            .await
    }

    async fn on_service_desk(
        &self,
        mut state: ConversationState,
        input: &str,
        command: Command,
        transport: &Arc<dyn ChatTransport>,
    ) -> Result<Transition> {
        if command == Command::Back {
            transport.send_text("🚫 Request cancelled.").await?;
            return Ok(Transition::Delete);
        }

        let count = state.service_desks.len();
        let index = parse_index(input, count).or_else(|| {
            state
                .service_desks
                .iter()
                .position(|d| d.project_key.eq_ignore_ascii_case(input))
        });
        let Some(index) = index else {
            transport
                .send_text(&render::invalid_selection(count, true))
                .await?;
            return Ok(Transition::Unchanged);
        };
        let desk = state.service_desks[index].clone();

        show_typing(transport).await;
        let listed = tokio::try_join!(
            self.client.list_portal_groups(&desk.id),
            self.client.list_request_types(&desk.id),
        );
        let (groups, request_types) = match listed {
            Ok(listed) => listed,
            Err(e) => {
                warn!(service_desk_id = %desk.id, error = %e, "Failed to load desk");
                transport
                    .send_text(&format!(
                        "❌ Failed to load {}: {}",
                        render::html_escape(&desk.project_name),
                        render::html_escape(&e.to_string())
                    ))
                    .await?;
                return Ok(Transition::Unchanged);
            }
        };

        if request_types.is_empty() {
            transport
                .send_text(&format!(
                    "{} has no request types. Pick another desk.",
                    render::html_escape(&desk.project_name)
                ))
                .await?;
            return Ok(Transition::Unchanged);
        }

        state.selected_service_desk = Some(desk);
        state.portal_groups = groups;
        state.request_types = request_types;

        if state.has_portal_groups() {
            state.step = Step::SelectPortalGroup;
            if let Some(desk) = &state.selected_service_desk {
                transport
                    .send_text(&render::portal_groups_prompt(desk, &state.portal_groups))
                    .await?;
            }
            return Ok(Transition::Save(state));
        }

        state.filtered_request_types = state.request_types.clone();
        self.show_request_types(state, transport).await
    }

    async fn on_portal_group(
        &self,
        mut state: ConversationState,
        input: &str,
        command: Command,
        transport: &Arc<dyn ChatTransport>,
    ) -> Result<Transition> {
        if command == Command::Back {
            state.reset_to_service_desk();
            transport
                .send_text(&render::service_desks_prompt(&state.service_desks))
                .await?;
            return Ok(Transition::Save(state));
        }

        let count = state.portal_groups.len();
        let Some(index) = parse_index(input, count) else {
            transport
                .send_text(&render::invalid_selection(count, false))
                .await?;
            return Ok(Transition::Unchanged);
        };
        let group = state.portal_groups[index].clone();

        let filtered: Vec<_> = state
            .request_types
            .iter()
            .filter(|rt| rt.belongs_to(&group))
            .cloned()
            .collect();
        if filtered.is_empty() {
            transport
                .send_text(&format!(
                    "{} has no request types. Pick another category.",
                    render::html_escape(&group.name)
                ))
                .await?;
            return Ok(Transition::Unchanged);
        }

        state.selected_portal_group = Some(group);
        state.filtered_request_types = filtered;
        self.show_request_types(state, transport).await
    }

    /// Fetch fields and forms of every listed request type, then show the list.
    async fn show_request_types(
        &self,
        mut state: ConversationState,
        transport: &Arc<dyn ChatTransport>,
    ) -> Result<Transition> {
        let Some(desk_id) = state.selected_service_desk.as_ref().map(|d| d.id.clone()) else {
            state.reset_to_service_desk();
            transport
                .send_text(&render::service_desks_prompt(&state.service_desks))
                .await?;
            return Ok(Transition::Save(state));
        };

        show_typing(transport).await;
        let client = self.client.as_ref();
        let desk_id = desk_id.as_str();
        let fetches = state.filtered_request_types.iter().map(|rt| async move {
            let (fields, form) = tokio::join!(
                client.get_portal_fields(desk_id, &rt.id),
                client.get_request_type_form(desk_id, &rt.id),
            );
            (rt.id.clone(), fields, form)
        });
        let results = join_all(fetches).await;

        for (request_type_id, fields, form) in results {
            match fields {
                Ok(fields) => {
                    state
                        .request_type_fields_cache
                        .insert(request_type_id.clone(), fields);
                }
                Err(e) => {
                    warn!(request_type_id = %request_type_id, error = %e, "Failed to load portal fields");
                }
            }
            match form {
                Ok(form) => {
                    state.request_type_forms_cache.insert(request_type_id, form);
                }
                Err(e) => {
                    warn!(request_type_id = %request_type_id, error = %e, "Failed to load form");
                }
            }
        }

        state.step = Step::SelectRequestType;
        transport
            .send_text(&render::request_types_prompt(&state))
            .await?;
        Ok(Transition::Save(state))
    }

    async fn on_request_type(
        &self,
        mut state: ConversationState,
        input: &str,
        command: Command,
        transport: &Arc<dyn ChatTransport>,
    ) -> Result<Transition> {
        if command == Command::Back {
            if state.has_portal_groups() {
                state.reset_to_portal_group();
                if let Some(desk) = &state.selected_service_desk {
                    transport
                        .send_text(&render::portal_groups_prompt(desk, &state.portal_groups))
                        .await?;
                }
            } else {
                state.reset_to_service_desk();
                transport
                    .send_text(&render::service_desks_prompt(&state.service_desks))
                    .await?;
            }
            return Ok(Transition::Save(state));
        }

        let count = state.filtered_request_types.len();
        let Some(index) = parse_index(input, count) else {
            transport
                .send_text(&render::invalid_selection(count, false))
                .await?;
            return Ok(Transition::Unchanged);
        };
        let request_type = state.filtered_request_types[index].clone();
        let Some(desk_id) = state.selected_service_desk.as_ref().map(|d| d.id.clone()) else {
            return Ok(Transition::Unchanged);
        };

        let portal_fields = match state.request_type_fields_cache.get(&request_type.id) {
            Some(fields) => fields.clone(),
            None => {
                show_typing(transport).await;
                match self
                    .client
                    .get_portal_fields(&desk_id, &request_type.id)
                    .await
                {
                    Ok(fields) => fields,
                    Err(e) => {
                        warn!(request_type_id = %request_type.id, error = %e, "Failed to load portal fields");
                        transport
                            .send_text(&format!(
                                "❌ Failed to load fields for {}: {}",
                                render::html_escape(&request_type.name),
                                render::html_escape(&e.to_string())
                            ))
                            .await?;
                        return Ok(Transition::Unchanged);
                    }
                }
            }
        };

        let form = match state.request_type_forms_cache.get(&request_type.id) {
            Some(form) => form.clone(),
            None => self
                .client
                .get_request_type_form(&desk_id, &request_type.id)
                .await
                .unwrap_or_else(|e| {
                    warn!(request_type_id = %request_type.id, error = %e, "Failed to load form");
                    None
                }),
        };

        let visible: Vec<_> = portal_fields.into_iter().filter(|f| f.visible).collect();
        let questions = form.as_ref().map(|f| f.questions.as_slice()).unwrap_or_default();
        let fields = reconcile_fields(&visible, questions);
        debug!(
            request_type_id = %request_type.id,
            fields = fields.len(),
            has_form = form.is_some(),
            "Reconciled request fields"
        );

        let no_fields = fields.is_empty();
        state.selected_request_type = Some(request_type);
        state.form_template = form;
        state.field_collection = Some(FieldCollection::new(fields));

        if no_fields {
            state.step = Step::Confirm;
            transport
                .send_text(&render::confirm_prompt(&state))
                .await?;
        } else {
            state.step = Step::CollectField;
            if let Some(collection) = &state.field_collection {
                transport
                    .send_text(&render::field_prompt(collection))
                    .await?;
            }
        }
        Ok(Transition::Save(state))
    }

    async fn on_confirm(
        &self,
        mut state: ConversationState,
        conversation_id: &str,
        input: &str,
        command: Command,
        transport: &Arc<dyn ChatTransport>,
    ) -> Result<Transition> {
        if command == Command::Back {
            match state.field_collection.as_mut() {
                Some(collection) if !collection.fields.is_empty() => {
                    collection.rewind_to(collection.fields.len() - 1);
                    state.step = Step::CollectField;
                    transport
                        .send_text(&render::field_prompt_with_recap(collection))
                        .await?;
                }
                _ => {
                    state.reset_to_request_type();
                    transport
                        .send_text(&render::request_types_prompt(&state))
                        .await?;
                }
            }
            return Ok(Transition::Save(state));
        }

        match input.to_lowercase().as_str() {
            "yes" | "y" | "retry" => {}
            "no" | "n" => {
                info!(conversation_id = %conversation_id, "Request discarded");
                transport.send_text("🗑 Request discarded.").await?;
                return Ok(Transition::Delete);
            }
            _ => {
                transport
                    .send_text(&render::confirm_prompt(&state))
                    .await?;
                return Ok(Transition::Unchanged);
            }
        }

        let typing = TypingIndicator::start(Arc::clone(transport), self.settings.typing_interval);
        let outcome =
            submit::submit(self.client.as_ref(), &state, self.settings.form_attach_delay).await;
        typing.stop();

        match outcome {
            SubmitOutcome::MissingFields(names) => {
                transport
                    .send_text(&render::missing_fields(&names))
                    .await?;
                Ok(Transition::Unchanged)
            }
            SubmitOutcome::Created(report) => {
                info!(
                    conversation_id = %conversation_id,
                    issue_key = %report.created.issue_key,
                    "Request submitted"
                );
                transport
                    .send_text(&render::submission_success(&report))
                    .await?;
                Ok(Transition::Delete)
            }
            SubmitOutcome::Failed { error, elapsed } => {
                transport
                    .send_text(&render::submission_failure(&error, elapsed))
                    .await?;
                Ok(Transition::Unchanged)
            }
        }
    }
}

async fn on_collect_field(
    mut state: ConversationState,
    input: &str,
    command: Command,
    transport: &Arc<dyn ChatTransport>,
) -> Result<Transition> {
    let Some(collection) = state.field_collection.as_mut() else {
        state.reset_to_request_type();
        transport
            .send_text(&render::request_types_prompt(&state))
            .await?;
        return Ok(Transition::Save(state));
    };

    if command == Command::Back {
        if collection.awaiting_custom_value {
            collection.cancel_custom_value();
        } else if !collection.step_back() {
            state.reset_to_request_type();
            transport
                .send_text(&render::request_types_prompt(&state))
                .await?;
            return Ok(Transition::Save(state));
        }
        transport
            .send_text(&render::field_prompt(collection))
            .await?;
        return Ok(Transition::Save(state));
    }

    let Some(field) = collection.current_field().cloned() else {
        state.step = Step::Confirm;
        transport
            .send_text(&render::confirm_prompt(&state))
            .await?;
        return Ok(Transition::Save(state));
    };

    let pending = collection
        .awaiting_custom_value
        .then(|| collection.pending_choices.clone());

    match validate_input(&field, input, pending.as_deref()) {
        Outcome::Accept(value) => {
            collection.record(value);
            if collection.is_complete() {
                state.step = Step::Confirm;
                transport
                    .send_text(&render::confirm_prompt(&state))
                    .await?;
            } else {
                transport
                    .send_text(&render::field_prompt_with_recap(collection))
                    .await?;
            }
            Ok(Transition::Save(state))
        }
        Outcome::AwaitCustomValue { pending_choices } => {
            collection.await_custom_value(pending_choices);
            transport
                .send_text(&render::custom_value_prompt(&field))
                .await?;
            Ok(Transition::Save(state))
        }
        Outcome::Reject(message) => {
            transport
                .send_text(&format!("❌ {}", render::html_escape(&message)))
                .await?;
            Ok(Transition::Unchanged)
        }
    }
}

async fn show_typing(transport: &Arc<dyn ChatTransport>) {
    if let Err(e) = transport.send_typing().await {
        debug!(error = %e, "Typing indicator failed");
    }
}
