use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, Polling};
use tokio_util::sync::CancellationToken;

use dorafetch::cli::{Cli, Commands};
use dorafetch::core::error::{AppError, AppResult};
use dorafetch::core::metrics_server::start_metrics_server;
use dorafetch::core::{config, init_logger, log_startup_configuration};
use dorafetch::download::artifact::{spawn_sweeper, sweep_once};
use dorafetch::download::fetch::transfer_client;
use dorafetch::download::source::{build_chain, http_client};
use dorafetch::download::{BlockingPool, Fetcher, Pipeline, PipelineConfig};
use dorafetch::storage::SessionStore;
use dorafetch::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramFrontEnd};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, HTTP clients, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from handler tasks instead of losing them
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot (webhook: {})", webhook);
            run_bot(webhook).await?;
        }
        Some(Commands::Sweep { max_age_secs }) => {
            let max_age = max_age_secs
                .map(Duration::from_secs)
                .unwrap_or_else(config::cleanup::max_age);
            run_sweep(max_age).await?;
        }
        None => {
            log::info!("No command specified, running bot in default mode");
            run_bot(false).await?;
        }
    }
    Ok(())
}

/// One-off cleanup of the download folder
async fn run_sweep(max_age: Duration) -> AppResult<()> {
    let dir = PathBuf::from(config::DOWNLOAD_FOLDER.as_str());
    let removed = sweep_once(&dir, max_age).await?;
    log::info!("Removed {} stale artifact(s) from {}", removed, dir.display());
    Ok(())
}

async fn run_bot(use_webhook: bool) -> AppResult<()> {
    if config::BOT_TOKEN.is_empty() {
        return Err(AppError::Config("BOT_TOKEN environment variable not set".to_string()));
    }

    log_startup_configuration();

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let pool = BlockingPool::default();
    let chain = build_chain(&config::providers::ORDER, http_client()?, pool.clone());
    if chain.is_empty() {
        return Err(AppError::Config("No usable providers configured (PROVIDERS)".to_string()));
    }

    let download_dir = PathBuf::from(config::DOWNLOAD_FOLDER.as_str());
    tokio::fs::create_dir_all(&download_dir).await?;
    let fetcher = Fetcher::new(transfer_client()?, download_dir.clone(), pool);

    let sessions = Arc::new(SessionStore::default());
    let pipeline = Arc::new(Pipeline::new(
        chain,
        Arc::clone(&sessions),
        fetcher,
        Arc::new(TelegramFrontEnd::new(bot.clone())),
        PipelineConfig::from_env(),
    ));

    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(
        download_dir,
        sessions,
        config::cleanup::sweep_interval(),
        config::cleanup::max_age(),
        cancel.clone(),
    );

    let metrics_server = if *config::metrics::ENABLED {
        let port = *config::metrics::PORT;
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = start_metrics_server(port, cancel).await {
                log::error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    let handler = schema(HandlerDeps::new(pipeline));
    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .enable_ctrlc_handler()
        .build();

    let webhook_url = if use_webhook { config::WEBHOOK_URL.clone() } else { None };
    if use_webhook && webhook_url.is_none() {
        log::warn!("--webhook given but WEBHOOK_URL is not set, falling back to long polling");
    }

    match webhook_url {
        Some(url) => {
            let url = url::Url::parse(&url)?;
            let address: SocketAddr = ([0, 0, 0, 0], *config::PORT).into();
            log::info!("Starting bot in webhook mode at {} (listening on {})", url, address);

            let listener = webhooks::axum(bot, webhooks::Options::new(address, url)).await?;
            log::info!("📡 Ready to receive updates!");
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            log::info!("Starting bot in long polling mode");
            let listener = Polling::builder(bot).drop_pending_updates().build();
            log::info!("📡 Ready to receive updates!");
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
    }

    log::info!("Dispatcher shutdown gracefully");
    cancel.cancel();
    if let Err(e) = sweeper.await {
        log::warn!("Artifact sweeper did not stop cleanly: {}", e);
    }
    if let Some(server) = metrics_server {
        if let Err(e) = server.await {
            log::warn!("Metrics server did not stop cleanly: {}", e);
        }
    }

    Ok(())
}
