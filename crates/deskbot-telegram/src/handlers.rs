//! Command and message handlers for the Telegram bot.

use std::sync::{Arc, LazyLock};

use deskbot_itsm::render::html_escape;
use deskbot_itsm::ChatTransport;
use deskbot_models::Issue;
use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

use crate::state::BotState;
use crate::transport::TelegramTransport;

/// Issue type used by `/newticket`.
const NEW_TICKET_ISSUE_TYPE: &str = "Task";

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and get help")]
    Start,

    #[command(description = "Show help message")]
    Help,

    #[command(description = "Open a service desk request")]
    Request,

    #[command(description = "Cancel the request in progress")]
    Cancel,

    #[command(description = "Show a Jira issue: /ticket <KEY>")]
    Ticket(String),

    #[command(description = "Create a Jira task: /newticket <PROJECT> <summary>")]
    Newticket(String),
}

/// Jira issue key, e.g. `IT-42`.
static ISSUE_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*-\d+$").expect("Invalid issue key regex"));

/// Jira project key, e.g. `IT`.
static PROJECT_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("Invalid project key regex"));

/// Normalize an issue key argument, `None` if it is not one.
pub fn parse_issue_key(input: &str) -> Option<String> {
    let key = input.trim().to_uppercase();
    ISSUE_KEY_REGEX.is_match(&key).then_some(key)
}

/// Split `/newticket` arguments into project key and summary.
pub fn parse_new_ticket(input: &str) -> Option<(String, String)> {
    let (project, summary) = input.trim().split_once(char::is_whitespace)?;
    let project = project.to_uppercase();
    let summary = summary.trim();
    if summary.is_empty() || !PROJECT_KEY_REGEX.is_match(&project) {
        return None;
    }
    Some((project, summary.to_string()))
}

/// Render an issue for chat.
pub fn format_issue(issue: &Issue, url: &str) -> String {
    format!(
        "🎫 <b>{}</b>: {}\n\n\
        Status: {}\n\
        Type: {}\n\
        Priority: {}\n\
        Assignee: {}\n\n\
        <a href=\"{}\">Open in Jira</a>",
        html_escape(&issue.key),
        html_escape(&issue.summary),
        html_escape(&issue.status),
        html_escape(&issue.issue_type),
        html_escape(issue.priority.as_deref().unwrap_or("None")),
        html_escape(issue.assignee.as_deref().unwrap_or("Unassigned")),
        html_escape(url),
    )
}

fn transport_for(bot: &Bot, msg: &Message) -> Arc<dyn ChatTransport> {
    Arc::new(TelegramTransport::new(bot.clone(), msg.chat.id))
}

/// Handle the /start command.
pub async fn handle_start(bot: Bot, msg: Message) -> ResponseResult<()> {
    let welcome = "Welcome to Deskbot! 🛎\n\n\
        I can file service desk requests and look up Jira tickets.\n\n\
        <b>Getting Started:</b>\n\
        1. Send <code>create request</code> (or /request) to open a request\n\
        2. Pick a service desk, category and request type\n\
        3. Answer the questions, then reply <code>yes</code> to submit\n\n\
        Reply <code>back</code> to go back a step or <code>cancel</code> to stop at any time.\n\n\
        Type /help for all commands.";

    bot.send_message(msg.chat.id, welcome)
        .parse_mode(ParseMode::Html)
        .await?;

    info!(chat_id = %msg.chat.id, user = ?msg.from.as_ref().map(|u| &u.username), "User started bot");
    Ok(())
}

/// Handle the /help command.
pub async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    let help_text = Command::descriptions().to_string();
    bot.send_message(msg.chat.id, help_text).await?;
    Ok(())
}

/// Handle the /request command.
pub async fn handle_request(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let transport = transport_for(&bot, &msg);
    if let Err(e) = state
        .flow
        .start(&msg.chat.id.to_string(), &transport)
        .await
    {
        error!(chat_id = %msg.chat.id, error = %e, "Failed to start request flow");
    }
    Ok(())
}

/// Handle the /cancel command.
pub async fn handle_cancel(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let transport = transport_for(&bot, &msg);
    match state
        .flow
        .cancel(&msg.chat.id.to_string(), &transport)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            bot.send_message(msg.chat.id, "Nothing to cancel.").await?;
        }
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Failed to cancel request flow");
        }
    }
    Ok(())
}

/// Handle the /ticket command.
pub async fn handle_ticket(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    key: String,
) -> ResponseResult<()> {
    let Some(key) = parse_issue_key(&key) else {
        bot.send_message(
            msg.chat.id,
            "Please provide an issue key.\n\n<b>Usage:</b> <code>/ticket IT-42</code>",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    };

    match state.client.get_issue(&key).await {
        Ok(issue) => {
            let url = state.client.portal_url(&issue.key);
            bot.send_message(msg.chat.id, format_issue(&issue, &url))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Err(e) => {
            warn!(chat_id = %msg.chat.id, key = %key, error = %e, "Issue lookup failed");
            bot.send_message(
                msg.chat.id,
                format!("❌ Could not load {}: {}", key, html_escape(&e.to_string())),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
    }
    Ok(())
}

/// Handle the /newticket command.
pub async fn handle_new_ticket(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    args: String,
) -> ResponseResult<()> {
    let Some((project, summary)) = parse_new_ticket(&args) else {
        bot.send_message(
            msg.chat.id,
            "Please provide a project key and a summary.\n\n\
            <b>Usage:</b> <code>/newticket IT Printer on floor 3 is jammed</code>",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    };

    match state
        .client
        .create_issue(&project, &summary, NEW_TICKET_ISSUE_TYPE)
        .await
    {
        Ok(created) => {
            info!(chat_id = %msg.chat.id, key = %created.key, "Created issue");
            let url = state.client.portal_url(&created.key);
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Created <b>{}</b>\n<a href=\"{}\">Open in Jira</a>",
                    html_escape(&created.key),
                    html_escape(&url)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Err(e) => {
            warn!(chat_id = %msg.chat.id, project = %project, error = %e, "Issue creation failed");
            bot.send_message(
                msg.chat.id,
                format!("❌ Failed to create ticket: {}", html_escape(&e.to_string())),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
    }
    Ok(())
}

/// Handle regular text messages.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let transport = transport_for(&bot, &msg);
    match state
        .flow
        .handle_message(&msg.chat.id.to_string(), text, &transport)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            bot.send_message(
                msg.chat.id,
                "Send <code>create request</code> to open a service desk request, \
                or /help for all commands.",
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Request flow failed");
            bot.send_message(msg.chat.id, "⚠️ Something went wrong. Please try again.")
                .await?;
        }
    }
    Ok(())
}

/// Route a parsed command to its handler.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg).await,
        Command::Help => handle_help(bot, msg).await,
        Command::Request => handle_request(bot, msg, state).await,
        Command::Cancel => handle_cancel(bot, msg, state).await,
        Command::Ticket(key) => handle_ticket(bot, msg, state, key).await,
        Command::Newticket(args) => handle_new_ticket(bot, msg, state, args).await,
    }
}
