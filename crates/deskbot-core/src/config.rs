//! Shared configuration for Deskbot.
//!
//! Provides the state/config directory layout, `.env.local` loading and the
//! typed [`DeskbotConfig`] read from environment variables.
//!
//! # Storage Structure
//!
//! ```text
//! ~/.deskbot/
//! └── config/
//!     └── .env.local   # Secrets (Jira token, bot token)
//! ```
//!
//! # Environment Variables
//!
//! Required:
//! - `JIRA_BASE_URL`: Site URL, e.g. `https://example.atlassian.net`
//! - `JIRA_EMAIL`: Account email used for basic auth
//! - `JIRA_API_TOKEN`: API token for that account
//!
//! Optional:
//! - `JIRA_CLOUD_ID`: Cloud id, enables the forms API
//! - `JIRA_PORTAL_URL`: Base for customer-facing links (default: `JIRA_BASE_URL`)
//! - `ITSM_FORM_ATTACH_DELAY_MS`: Wait before attaching a form (default: 3000)
//! - `ITSM_STATE_TTL_SECS`: Idle time before a request flow is dropped (default: 3600)
//! - `ITSM_TYPING_INTERVAL_SECS`: Typing indicator refresh period (default: 4)
//! - `DESKBOT_STATE_DIR`: Override the base state directory

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{CoreError, Result};

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "DESKBOT_STATE_DIR";

pub const JIRA_BASE_URL_ENV: &str = "JIRA_BASE_URL";
pub const JIRA_EMAIL_ENV: &str = "JIRA_EMAIL";
pub const JIRA_API_TOKEN_ENV: &str = "JIRA_API_TOKEN";
pub const JIRA_CLOUD_ID_ENV: &str = "JIRA_CLOUD_ID";
pub const JIRA_PORTAL_URL_ENV: &str = "JIRA_PORTAL_URL";
pub const FORM_ATTACH_DELAY_ENV: &str = "ITSM_FORM_ATTACH_DELAY_MS";
pub const STATE_TTL_ENV: &str = "ITSM_STATE_TTL_SECS";
pub const TYPING_INTERVAL_ENV: &str = "ITSM_TYPING_INTERVAL_SECS";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".deskbot";

const CONFIG_SUBDIR: &str = "config";

const DEFAULT_FORM_ATTACH_DELAY_MS: u64 = 3000;
const DEFAULT_STATE_TTL_SECS: u64 = 3600;
const DEFAULT_TYPING_INTERVAL_SECS: u64 = 4;

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the Deskbot state directory.
///
/// 1. `DESKBOT_STATE_DIR` environment variable if set
/// 2. `~/.deskbot` if home directory is available
/// 3. `.deskbot` in current directory as fallback
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Get the user config directory.
pub fn config_dir() -> PathBuf {
    state_dir().join(CONFIG_SUBDIR)
}

/// Get the .env.local file path.
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Load environment variables from the config directory, then from a local
/// `.env.local` or `.env`. Already-set variables win.
pub fn load_env() {
    let path = env_file();
    if path.exists() {
        match dotenvy::from_path(&path) {
            Ok(()) => debug!(path = %path.display(), "Loaded env file"),
            Err(e) => debug!(path = %path.display(), error = %e, "Failed to load env file"),
        }
    }
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());
}

/// Runtime settings for the Jira clients and the request flow.
#[derive(Debug, Clone)]
pub struct DeskbotConfig {
    /// Jira site URL.
    pub jira_base_url: Url,
    /// Account email for basic auth.
    pub jira_email: String,
    /// API token for basic auth.
    pub jira_api_token: String,
    /// Atlassian cloud id; forms are unavailable without it.
    pub jira_cloud_id: Option<String>,
    /// Base for customer-facing request links.
    pub portal_base_url: Url,
    /// Wait before attaching a form to a freshly created request.
    pub form_attach_delay: Duration,
    /// Idle time after which an unfinished request flow is dropped.
    pub state_ttl: Duration,
    /// Typing indicator refresh period during submission.
    pub typing_interval: Duration,
}

impl DeskbotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    CoreError::Configuration(format!("Missing {} environment variable", key))
                })
        };
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str, default: u64| -> Result<u64> {
            match optional(key) {
                Some(v) => v.parse().map_err(|_| {
                    CoreError::Configuration(format!("{} must be a whole number, got '{}'", key, v))
                }),
                None => Ok(default),
            }
        };

        let jira_base_url = parse_base_url(&required(JIRA_BASE_URL_ENV)?)?;
        let portal_base_url = match optional(JIRA_PORTAL_URL_ENV) {
            Some(url) => parse_base_url(&url)?,
            None => jira_base_url.clone(),
        };

        Ok(Self {
            jira_base_url,
            jira_email: required(JIRA_EMAIL_ENV)?,
            jira_api_token: required(JIRA_API_TOKEN_ENV)?,
            jira_cloud_id: optional(JIRA_CLOUD_ID_ENV),
            portal_base_url,
            form_attach_delay: Duration::from_millis(number(
                FORM_ATTACH_DELAY_ENV,
                DEFAULT_FORM_ATTACH_DELAY_MS,
            )?),
            state_ttl: Duration::from_secs(number(STATE_TTL_ENV, DEFAULT_STATE_TTL_SECS)?),
            typing_interval: Duration::from_secs(number(
                TYPING_INTERVAL_ENV,
                DEFAULT_TYPING_INTERVAL_SECS,
            )?),
        })
    }
}

/// Parse a base URL, normalizing it to end with a slash so joins append.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
