//! Platform classification for incoming links.
//!
//! `classify` never fails: anything it does not recognise is `Platform::Unknown`.
//! The label only reorders the provider chain and tags logs/metrics; it never
//! decides whether a URL is attempted.

use std::fmt;
use url::Url;

/// Media platform a link belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    YouTube,
    Instagram,
    Twitter,
    TikTok,
    Facebook,
    Reddit,
    Vimeo,
    Dailymotion,
    LinkedIn,
    Pinterest,
    #[default]
    Unknown,
}

/// Host suffixes per platform. A host matches when it equals the suffix or is a subdomain of it.
const PLATFORM_HOSTS: &[(Platform, &[&str])] = &[
    (Platform::YouTube, &["youtube.com", "youtu.be", "youtube-nocookie.com"]),
    (Platform::Instagram, &["instagram.com"]),
    (Platform::Twitter, &["twitter.com", "x.com"]),
    (Platform::TikTok, &["tiktok.com"]),
    (Platform::Facebook, &["facebook.com", "fb.watch"]),
    (Platform::Reddit, &["reddit.com", "redd.it"]),
    (Platform::Vimeo, &["vimeo.com"]),
    (Platform::Dailymotion, &["dailymotion.com", "dai.ly"]),
    (Platform::LinkedIn, &["linkedin.com"]),
    (Platform::Pinterest, &["pinterest.com", "pin.it"]),
];

impl Platform {
    /// Stable lowercase label used in metrics and config
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::TikTok => "tiktok",
            Platform::Facebook => "facebook",
            Platform::Reddit => "reddit",
            Platform::Vimeo => "vimeo",
            Platform::Dailymotion => "dailymotion",
            Platform::LinkedIn => "linkedin",
            Platform::Pinterest => "pinterest",
            Platform::Unknown => "unknown",
        }
    }

    /// Name shown to users
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::Twitter => "Twitter/X",
            Platform::TikTok => "TikTok",
            Platform::Facebook => "Facebook",
            Platform::Reddit => "Reddit",
            Platform::Vimeo => "Vimeo",
            Platform::Dailymotion => "Dailymotion",
            Platform::LinkedIn => "LinkedIn",
            Platform::Pinterest => "Pinterest",
            Platform::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

fn host_matches(host: &str, suffix: &str) -> bool {
    host == suffix || host.strip_suffix(suffix).is_some_and(|rest| rest.ends_with('.'))
}

/// Maps a URL string to the platform it belongs to.
///
/// Total: malformed input, missing hosts and unrecognised domains all yield `Platform::Unknown`.
///
/// # Examples
/// ```
/// use dorafetch::core::platform::{classify, Platform};
///
/// assert_eq!(classify("https://youtu.be/dQw4w9WgXcQ"), Platform::YouTube);
/// assert_eq!(classify("https://m.tiktok.com/@user/video/1"), Platform::TikTok);
/// assert_eq!(classify("not a url"), Platform::Unknown);
/// ```
pub fn classify(url: &str) -> Platform {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return Platform::Unknown;
    };
    let Some(host) = parsed.host_str() else {
        return Platform::Unknown;
    };
    let host = host.to_ascii_lowercase();

    PLATFORM_HOSTS
        .iter()
        .find(|(_, suffixes)| suffixes.iter().any(|suffix| host_matches(&host, suffix)))
        .map(|(platform, _)| *platform)
        .unwrap_or(Platform::Unknown)
}
