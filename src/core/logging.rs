//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup summary of the provider chain and external binaries

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::process::{Command, Stdio};

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger was already set
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(LevelFilter::Info, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Info, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Returns true if `bin --version` runs successfully
fn binary_available(bin: &str) -> bool {
    Command::new(bin)
        .arg(if bin.contains("ffmpeg") { "-version" } else { "--version" })
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Logs the effective pipeline configuration at startup
///
/// Checks:
/// - Provider order and provider-specific endpoints
/// - yt-dlp / ffmpeg availability (audio extraction needs ffmpeg)
/// - Download folder and size ceiling
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🔧 Pipeline Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log::info!("Provider order: {}", config::providers::ORDER.join(" → "));

    match config::providers::COBALT_API_URL.as_deref() {
        Some(url) => log::info!("✅ COBALT_API_URL: {}", url),
        None => log::warn!("⚠️  COBALT_API_URL: not set (cobalt provider disabled)"),
    }
    log::info!("TikTok resolver: {}", *config::providers::TIKTOK_API_URL);

    if binary_available(&config::YTDL_BIN) {
        log::info!("✅ yt-dlp: {}", *config::YTDL_BIN);
    } else {
        log::error!("❌ yt-dlp not runnable at '{}' - ytdlp provider will fail", *config::YTDL_BIN);
    }

    if binary_available(&config::FFMPEG_BIN) {
        log::info!("✅ ffmpeg: {}", *config::FFMPEG_BIN);
    } else {
        log::error!(
            "❌ ffmpeg not runnable at '{}' - audio-only downloads will fail",
            *config::FFMPEG_BIN
        );
    }

    log::info!("Download folder: {}", *config::DOWNLOAD_FOLDER);
    log::info!(
        "Max file size: {}",
        crate::core::utils::format_bytes(Some(*config::validation::MAX_FILE_SIZE_BYTES))
    );
    log::info!("Blocking pool size: {}", *config::pool::SIZE);
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
