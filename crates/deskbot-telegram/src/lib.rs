//! Telegram bot interface for Deskbot.
//!
//! Hosts the ITSM request flow in Telegram chats and adds a couple of plain
//! Jira ticket commands.
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//! - `JIRA_BASE_URL`, `JIRA_EMAIL`, `JIRA_API_TOKEN`: Jira access
//!
//! Optional:
//! - `JIRA_CLOUD_ID`: Enables form attachment
//! - `ITSM_STATE_TTL_SECS`: Idle time before an unfinished request is dropped
//!
//! # Commands
//!
//! - `/start` - Welcome message
//! - `/help` - Show available commands
//! - `/request` - Open a service desk request (same as `create request`)
//! - `/cancel` - Cancel the request in progress
//! - `/ticket <KEY>` - Show a Jira issue
//! - `/newticket <PROJECT> <summary>` - Create a Jira task

pub mod bot;
pub mod error;
pub mod handlers;
pub mod state;
pub mod transport;

pub use bot::TelegramBot;
pub use error::{Result, TelegramError};
pub use state::{create_shared_state, BotState};
pub use transport::TelegramTransport;
