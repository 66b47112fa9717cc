//! Dispatcher schema: commands, link messages and quality-selection callbacks.
//!
//! The dispatcher handles one chat's updates in order, so a user's second link
//! is processed after their first finishes resolving.

use std::sync::Arc;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use crate::core::types::SelectionToken;
use crate::download::pipeline::Pipeline;
use crate::telegram::bot::Command;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub pipeline: Arc<Pipeline>,
}

impl HandlerDeps {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

pub const WELCOME_MESSAGE: &str = "🎬 Media Downloader Bot

Welcome! This bot downloads videos and audio from links you send.

⚠️ IMPORTANT: Only download content you own or have permission to use!

📱 Supported platforms:
YouTube, Instagram, Twitter/X, Facebook, TikTok, Reddit, Vimeo, Dailymotion, LinkedIn, Pinterest, and more!

🎯 How to use:
1. Send me a link
2. Select your preferred quality
3. Receive your file!

Type /help for detailed instructions.";

pub const HELP_MESSAGE: &str = "📖 Help & Usage Guide

Basic usage:
1️⃣ Send any media link from a supported platform
2️⃣ Wait for quality options to appear
3️⃣ Tap your preferred quality
4️⃣ Receive your file!

Quality options (when available):
• 4K (2160p), 2K (1440p), 1080p, 720p, 480p, 360p
• Audio Only (MP3)

File size limit:
• Bots can send files up to 50 MB
• Pick a lower quality or audio for long videos

Only your latest link is active: sending a new one expires the buttons of the previous one.

Privacy:
• Files are deleted right after sending
• You are responsible for legal compliance; see /terms

Commands:
/start - Welcome message
/help - This message
/terms - Terms of service";

pub const TERMS_OF_SERVICE: &str = "📋 TERMS OF SERVICE

By using this bot, you acknowledge and agree:

✅ Authorized use only:
- Download ONLY content you own or have explicit permission to download
- Use downloaded content for personal or authorized purposes only

⚖️ Legal compliance:
- You are solely responsible for complying with copyright law
- You are responsible for complying with each platform's terms of service

⚠️ Liability disclaimer:
- This bot is provided \"AS IS\"
- The operator is not liable for any misuse

By using this bot, you accept these terms.";

/// First http(s) link in a message, if any
pub fn extract_url(text: &str) -> Option<&str> {
    text.split_whitespace()
        .find(|word| word.starts_with("http://") || word.starts_with("https://"))
}

/// Creates the dispatcher schema.
///
/// The same tree is used in production and by integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler(deps.clone()))
        .branch(link_handler(deps.clone()))
        .branch(callback_handler(deps))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move { handle_command(bot, msg, cmd, deps).await }
        },
    ))
}

fn link_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().and_then(extract_url).is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move { handle_link(bot, msg, deps).await }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move { handle_selection(bot, q, deps).await }
    })
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command, deps: HandlerDeps) -> Result<(), HandlerError> {
    log::info!("Received command {:?} from chat {}", cmd, msg.chat.id);

    let text = match cmd {
        Command::Start => {
            // a restart drops any pending quality buttons
            if let Some(user) = msg.from.as_ref() {
                deps.pipeline.reset_session(user.id.0);
            }
            format!("{}\n\n{}", WELCOME_MESSAGE, TERMS_OF_SERVICE)
        }
        Command::Help => HELP_MESSAGE.to_string(),
        Command::Terms => TERMS_OF_SERVICE.to_string(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_link(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(url) = msg.text().and_then(extract_url) else {
        return Ok(());
    };

    let status = bot
        .send_message(msg.chat.id, "🔍 Analyzing link...\n\nPlease wait...")
        .await?;

    // failures are already reported to the user by the pipeline
    let _ = deps.pipeline.submit_url(user.id.0, url).await;

    if let Err(e) = bot.delete_message(msg.chat.id, status.id).await {
        log::debug!("Failed to delete status message: {}", e);
    }
    Ok(())
}

async fn handle_selection(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(token) = q.data.as_deref().and_then(SelectionToken::from_callback_data) else {
        log::debug!("Ignoring foreign callback data {:?}", q.data);
        return Ok(());
    };

    let keyboard_message = q.regular_message().map(|m| (m.chat.id, m.id));
    if let Some((chat_id, message_id)) = keyboard_message {
        if let Err(e) = bot
            .edit_message_text(
                chat_id,
                message_id,
                "⬇️ Downloading...\n\nPlease wait, this may take a few moments...",
            )
            .await
        {
            log::debug!("Failed to update keyboard message: {}", e);
        }
    }

    let _ = deps.pipeline.submit_selection(q.from.id.0, &token).await;

    if let Some((chat_id, message_id)) = keyboard_message {
        if let Err(e) = bot.delete_message(chat_id, message_id).await {
            log::debug!("Failed to delete keyboard message: {}", e);
        }
    }
    Ok(())
}
