//! Bot initialization: command list and the `Bot` instance.

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot and see the welcome message")]
    Start,
    #[command(description = "show usage instructions")]
    Help,
    #[command(description = "view the terms of service")]
    Terms,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(AppError)` - Invalid BOT_API_URL or HTTP client failure
pub fn create_bot() -> AppResult<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    let bot = match std::env::var("BOT_API_URL") {
        Ok(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            bot.set_api_url(parse_api_url(&bot_api_url)?)
        }
        Err(_) => bot,
    };

    Ok(bot)
}

/// Parses a custom Bot API server address
pub fn parse_api_url(raw: &str) -> AppResult<url::Url> {
    let url = url::Url::parse(raw.trim()).map_err(|e| AppError::Config(format!("Invalid BOT_API_URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Config(format!("BOT_API_URL must be http(s), got '{}'", url.scheme())));
    }
    Ok(url)
}

/// Registers the command list shown in the Telegram UI.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    let commands: Vec<BotCommand> = Command::bot_commands();
    bot.set_my_commands(commands).await?;
    Ok(())
}
