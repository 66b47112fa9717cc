use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Reads an environment variable, treating blank values as unset.
fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Public base URL for webhook mode
/// Read from WEBHOOK_URL environment variable
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| env_non_empty("WEBHOOK_URL"));

/// Port the webhook listener binds to
/// Read from PORT environment variable
/// Default: 8443
pub static PORT: Lazy<u16> = Lazy::new(|| env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8443));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: bot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "bot.log".to_string()));

/// Folder where artifacts live between fetch and delivery
/// Read from DOWNLOAD_FOLDER environment variable
/// Supports tilde (~) expansion
/// Default: downloads
pub static DOWNLOAD_FOLDER: Lazy<String> = Lazy::new(|| {
    let raw = env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string());
    shellexpand::tilde(&raw).into_owned()
});

/// yt-dlp binary path
/// Read from YTDL_BIN environment variable
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// ffmpeg binary path
/// Read from FFMPEG_BIN environment variable
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// Provider chain configuration
pub mod providers {
    use super::env_non_empty;
    use once_cell::sync::Lazy;

    /// Default provider priority order
    pub const DEFAULT_ORDER: &str = "tiktok,ytdlp,cobalt,direct";

    /// Comma-separated provider names in priority order
    /// Read from PROVIDERS environment variable
    /// Unknown names are logged and skipped when the chain is built
    pub static ORDER: Lazy<Vec<String>> = Lazy::new(|| {
        env_non_empty("PROVIDERS")
            .unwrap_or_else(|| DEFAULT_ORDER.to_string())
            .split(',')
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect()
    });

    /// Cobalt-compatible API endpoint
    /// Read from COBALT_API_URL environment variable
    /// The cobalt provider is skipped when unset
    pub static COBALT_API_URL: Lazy<Option<String>> = Lazy::new(|| env_non_empty("COBALT_API_URL"));

    /// Optional API key sent as `Authorization: Api-Key <key>`
    /// Read from COBALT_API_KEY environment variable
    pub static COBALT_API_KEY: Lazy<Option<String>> = Lazy::new(|| env_non_empty("COBALT_API_KEY"));

    /// TikTok resolver API endpoint
    /// Read from TIKTOK_API_URL environment variable
    /// Default: https://www.tikwm.com/api/
    pub static TIKTOK_API_URL: Lazy<String> =
        Lazy::new(|| env_non_empty("TIKTOK_API_URL").unwrap_or_else(|| "https://www.tikwm.com/api/".to_string()));
}

/// Provider call configuration
pub mod provider {
    use super::Duration;

    /// Upper bound for a single probe/resolve call (in seconds)
    pub const CALL_TIMEOUT_SECS: u64 = 30;

    /// yt-dlp download timeout (in seconds); covers the whole transfer
    pub const YTDLP_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

    /// ffmpeg audio extraction timeout (in seconds)
    pub const FFMPEG_TIMEOUT_SECS: u64 = 300;

    pub fn call_timeout() -> Duration {
        Duration::from_secs(CALL_TIMEOUT_SECS)
    }

    pub fn ytdlp_download_timeout() -> Duration {
        Duration::from_secs(YTDLP_DOWNLOAD_TIMEOUT_SECS)
    }

    pub fn ffmpeg_timeout() -> Duration {
        Duration::from_secs(FFMPEG_TIMEOUT_SECS)
    }
}

/// Transfer configuration
pub mod fetch {
    use super::Duration;

    /// TCP connect timeout (in seconds)
    pub const CONNECT_TIMEOUT_SECS: u64 = 30;

    /// Maximum time between two received chunks (in seconds)
    pub const READ_TIMEOUT_SECS: u64 = 60;

    /// Retries on transient failures, on top of the first attempt
    pub const MAX_RETRIES: u32 = 3;

    /// Delay before the first retry (in milliseconds); doubles per attempt
    pub const RETRY_INITIAL_DELAY_MS: u64 = 1000;

    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_TIMEOUT_SECS)
    }

    pub fn read_timeout() -> Duration {
        Duration::from_secs(READ_TIMEOUT_SECS)
    }

    pub fn retry_initial_delay() -> Duration {
        Duration::from_millis(RETRY_INITIAL_DELAY_MS)
    }
}

/// Blocking worker pool configuration
pub mod pool {
    use once_cell::sync::Lazy;
    use std::env;

    /// Maximum number of blocking jobs (yt-dlp, ffmpeg) running at once
    /// Read from BLOCKING_POOL_SIZE environment variable
    /// Default: 4
    pub static SIZE: Lazy<usize> = Lazy::new(|| {
        env::var("BLOCKING_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|size| *size > 0)
            .unwrap_or(4)
    });
}

/// Session store configuration
pub mod session {
    use super::Duration;
    use once_cell::sync::Lazy;
    use std::env;

    pub const DEFAULT_TTL_SECS: u64 = 3600;

    /// How long a presented set of options stays selectable (in seconds)
    /// Read from SESSION_TTL_SECS environment variable
    /// Default: 3600 (1 hour)
    pub static TTL_SECS: Lazy<u64> = Lazy::new(|| ttl_secs(env::var("SESSION_TTL_SECS").ok().as_deref()));

    /// Parses a TTL setting; missing, unparsable or zero values give the default
    pub fn ttl_secs(raw: Option<&str>) -> u64 {
        raw.and_then(|v| v.trim().parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TTL_SECS)
    }

    pub fn ttl() -> Duration {
        Duration::from_secs(*TTL_SECS)
    }
}

/// Artifact lifetime configuration
pub mod cleanup {
    use super::Duration;
    use once_cell::sync::Lazy;
    use std::env;

    /// Interval between sweeps of the download folder (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 600;

    /// Artifacts older than this are deleted by the sweeper
    /// Read from ARTIFACT_MAX_AGE_SECS environment variable
    /// Default: 3600 (1 hour)
    pub static MAX_AGE_SECS: Lazy<u64> = Lazy::new(|| {
        env::var("ARTIFACT_MAX_AGE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600)
    });

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }

    pub fn max_age() -> Duration {
        Duration::from_secs(*MAX_AGE_SECS)
    }
}

/// Validation configuration
pub mod validation {
    use once_cell::sync::Lazy;
    use std::env;

    /// Maximum URL length (RFC 7230 recommends 8000, but we use 2048 for safety)
    pub const MAX_URL_LENGTH: usize = 2048;

    /// Telegram Bot API upload ceiling (50 MB)
    pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

    /// Delivery size ceiling
    /// Read from MAX_FILE_SIZE_MB environment variable
    /// Default: 50 MB (standard api.telegram.org limit)
    pub static MAX_FILE_SIZE_BYTES: Lazy<u64> =
        Lazy::new(|| file_size_limit(env::var("MAX_FILE_SIZE_MB").ok().as_deref()));

    /// Converts a megabyte setting to bytes; unparsable, zero or overflowing values give the default
    pub fn file_size_limit(megabytes: Option<&str>) -> u64 {
        megabytes
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|mb| *mb > 0)
            .and_then(|mb| mb.checked_mul(1024 * 1024))
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES)
    }
}

/// Metrics and monitoring configuration
pub mod metrics {
    use once_cell::sync::Lazy;
    use std::env;

    /// Enable the metrics HTTP server
    /// Read from METRICS_ENABLED environment variable
    /// Default: true
    pub static ENABLED: Lazy<bool> = Lazy::new(|| {
        env::var("METRICS_ENABLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true)
    });

    /// Port for metrics HTTP server
    /// Read from METRICS_PORT environment variable
    /// Default: 9090
    pub static PORT: Lazy<u16> = Lazy::new(|| {
        env::var("METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9090)
    });
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Telegram API calls (in seconds)
    /// Uploads of files close to the size ceiling can take a while
    pub const REQUEST_TIMEOUT_SECS: u64 = 300;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
