//! Deskbot Core - configuration and upstream service clients.
//!
//! - **config**: state/config paths, `.env.local` loading and [`DeskbotConfig`]
//! - **ticketing**: the [`TicketingClient`] trait consumed by the request flow
//! - **jira**: [`JiraClient`], the REST implementation of that trait

pub mod config;
pub mod error;
pub mod jira;
pub mod ticketing;

pub use config::{config_dir, env_file, load_env, state_dir, DeskbotConfig};
pub use error::{CoreError, Result};
pub use jira::JiraClient;
pub use ticketing::TicketingClient;
