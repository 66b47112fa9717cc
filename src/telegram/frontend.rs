//! Telegram implementation of the pipeline's `FrontEnd`.
//!
//! Users talk to the bot in private chats, so a user id doubles as the chat id.

use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile};

use crate::core::error::ErrorKind;
use crate::core::platform::Platform;
use crate::core::types::{FormatOption, MediaKind, SelectionToken, UserId};
use crate::core::utils::format_bytes;
use crate::download::error::DeliveryError;
use crate::download::pipeline::FrontEnd;

/// Button text for one option: "{quality} - {size}"
pub fn button_label(option: &FormatOption) -> String {
    format!("{} - {}", option.quality_label, format_bytes(option.estimated_size_bytes))
}

/// One button per row, in catalog order
pub fn options_keyboard(options: &[(SelectionToken, FormatOption)]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = options
        .iter()
        .map(|(token, option)| vec![InlineKeyboardButton::callback(button_label(option), token.to_callback_data())])
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn classify_send_error(err: teloxide::RequestError) -> DeliveryError {
    let text = err.to_string();
    let lower = text.to_lowercase();
    if lower.contains("too large") || lower.contains("too big") {
        DeliveryError::PayloadTooLarge(text)
    } else if matches!(err, teloxide::RequestError::Network(_) | teloxide::RequestError::Io(_)) {
        DeliveryError::Network(text)
    } else {
        DeliveryError::Other(text)
    }
}

fn chat_of(user_id: UserId) -> ChatId {
    ChatId(user_id as i64)
}

#[derive(Clone)]
pub struct TelegramFrontEnd {
    bot: Bot,
}

impl TelegramFrontEnd {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl FrontEnd for TelegramFrontEnd {
    async fn present_options(
        &self,
        user_id: UserId,
        platform: Platform,
        options: &[(SelectionToken, FormatOption)],
    ) -> Result<(), DeliveryError> {
        let text = format!(
            "✅ Media found!\n\n🌐 Platform: {}\n\n📊 Select quality:",
            platform.display_name()
        );
        self.bot
            .send_message(chat_of(user_id), text)
            .reply_markup(options_keyboard(options))
            .await
            .map_err(classify_send_error)?;
        Ok(())
    }

    async fn deliver_artifact(
        &self,
        user_id: UserId,
        path: &Path,
        kind: MediaKind,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let chat = chat_of(user_id);
        let file = InputFile::file(path.to_path_buf());

        match kind {
            MediaKind::Audio => {
                self.bot
                    .send_audio(chat, file)
                    .caption(caption)
                    .await
                    .map_err(classify_send_error)?;
            }
            MediaKind::Video => {
                self.bot
                    .send_video(chat, file)
                    .caption(caption)
                    .supports_streaming(true)
                    .await
                    .map_err(classify_send_error)?;
            }
        }

        if let Err(e) = self
            .bot
            .send_message(chat, "✅ Download complete!\n\nSend another URL to download more.")
            .await
        {
            log::warn!("Failed to send completion message to {}: {}", user_id, e);
        }
        Ok(())
    }

    async fn report_error(&self, user_id: UserId, kind: ErrorKind, message: &str) {
        if let Err(e) = self.bot.send_message(chat_of(user_id), message).await {
            log::error!("Failed to report {} to user {}: {}", kind.as_str(), user_id, e);
        }
    }
}
