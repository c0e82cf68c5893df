//! Main Telegram bot implementation.

use std::sync::Arc;
use std::time::Duration;

use deskbot_core::DeskbotConfig;
use teloxide::prelude::*;
use tokio::time::interval;
use tracing::{info, warn};

use crate::error::{Result, TelegramError};
use crate::handlers::{handle_command, handle_message, Command};
use crate::state::{create_shared_state, BotState};

/// Shortest period between idle-state sweeps.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// The Telegram bot for Deskbot.
pub struct TelegramBot {
    /// The teloxide bot instance.
    bot: Bot,
    /// Shared state across handlers.
    state: Arc<BotState>,
}

impl TelegramBot {
    /// Create a new TelegramBot instance.
    ///
    /// Requires `TELEGRAM_BOT_TOKEN` environment variable to be set.
    pub fn new(config: &DeskbotConfig) -> Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").map_err(|_| TelegramError::NoToken)?;
        let state = create_shared_state(config)?;
        Ok(Self {
            bot: Bot::new(token),
            state,
        })
    }

    /// Create a TelegramBot with custom state (for testing).
    pub fn with_state(state: Arc<BotState>) -> Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").map_err(|_| TelegramError::NoToken)?;
        Ok(Self {
            bot: Bot::new(token),
            state,
        })
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TelegramError::BotStartFailed(e.to_string()))?;
        Ok(me.username().to_string())
    }

    /// Start the bot in polling mode.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");

        let bot = self.bot.clone();

        let sweep_state = Arc::clone(&self.state);
        tokio::spawn(async move {
            sweep_idle_loop(sweep_state).await;
        });

        let state_for_commands = Arc::clone(&self.state);
        let state_for_messages = Arc::clone(&self.state);

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let state = Arc::clone(&state_for_commands);
                        info!(chat_id = %msg.chat.id, "Command matched: {:?}", cmd);
                        async move { handle_command(bot, msg, cmd, state).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().is_some_and(|t| t.starts_with('/')))
                    .endpoint(|bot: Bot, msg: Message| async move {
                        if let Some(text) = msg.text() {
                            info!(cmd = %text, "Unrecognized command - sending response");
                            bot.send_message(
                                msg.chat.id,
                                format!(
                                    "Unknown command: {}\n\nUse /help to see available commands.",
                                    text.split_whitespace().next().unwrap_or(text)
                                ),
                            )
                            .await?;
                        }
                        Ok(())
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().is_some_and(|t| !t.starts_with('/')))
                    .endpoint(move |bot: Bot, msg: Message| {
                        let state = Arc::clone(&state_for_messages);
                        async move { handle_message(bot, msg, state).await }
                    }),
            );

        info!("Bot is running! Send /start to begin.");

        Dispatcher::builder(bot, handler)
            .default_handler(|upd| async move {
                warn!("Unhandled update: {:?}", upd);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

/// Background task dropping request flows nobody has touched within the TTL.
async fn sweep_idle_loop(state: Arc<BotState>) {
    let mut sweep_interval = interval(sweep_period(state.state_ttl));

    loop {
        sweep_interval.tick().await;
        if let Err(e) = state.flow.purge_idle(state.state_ttl).await {
            warn!(error = %e, "Failed to purge idle request flows");
        }
    }
}

/// Sweep a few times per TTL, but not more often than every 30 seconds.
fn sweep_period(ttl: Duration) -> Duration {
    (ttl / 4).max(MIN_SWEEP_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_period() {
        assert_eq!(sweep_period(Duration::from_secs(3600)), Duration::from_secs(900));
        assert_eq!(sweep_period(Duration::from_secs(10)), MIN_SWEEP_INTERVAL);
    }
}
