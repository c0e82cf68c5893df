//! Shared state for the Telegram bot.

use std::sync::Arc;
use std::time::Duration;

use deskbot_core::{DeskbotConfig, JiraClient, TicketingClient};
use deskbot_itsm::{FlowSettings, InMemoryConversationStore, RequestFlow};

use crate::error::Result;

/// State shared by all handlers.
pub struct BotState {
    /// Jira access for the ticket commands.
    pub client: Arc<dyn TicketingClient>,
    /// The ITSM request flow.
    pub flow: RequestFlow,
    /// Idle time after which an unfinished request is dropped.
    pub state_ttl: Duration,
}

impl BotState {
    /// Build state backed by Jira.
    pub fn new(config: &DeskbotConfig) -> Result<Self> {
        let client: Arc<dyn TicketingClient> = Arc::new(JiraClient::new(config)?);
        Ok(Self::with_client(
            client,
            FlowSettings::from_config(config),
            config.state_ttl,
        ))
    }

    /// Build state around an arbitrary ticketing client.
    pub fn with_client(
        client: Arc<dyn TicketingClient>,
        settings: FlowSettings,
        state_ttl: Duration,
    ) -> Self {
        let store = Arc::new(InMemoryConversationStore::new());
        let flow = RequestFlow::new(Arc::clone(&client), store, settings);
        Self {
            client,
            flow,
            state_ttl,
        }
    }
}

/// Create shared state for the bot.
pub fn create_shared_state(config: &DeskbotConfig) -> Result<Arc<BotState>> {
    Ok(Arc::new(BotState::new(config)?))
}
