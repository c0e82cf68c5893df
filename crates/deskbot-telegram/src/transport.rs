//! Telegram side of the chat transport.

use async_trait::async_trait;
use deskbot_itsm::{ChatTransport, ItsmError};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ParseMode};

/// Sends flow messages to one Telegram chat.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramTransport {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, text: &str) -> deskbot_itsm::Result<()> {
        self.bot
            .send_message(self.chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| ItsmError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn send_typing(&self) -> deskbot_itsm::Result<()> {
        self.bot
            .send_chat_action(self.chat_id, ChatAction::Typing)
            .await
            .map_err(|e| ItsmError::Transport(e.to_string()))?;
        Ok(())
    }
}
