/// Formats a byte count for display in buttons and messages.
///
/// `None` renders as "Unknown", which is what providers without size hints produce.
///
/// # Example
///
/// ```
/// use dorafetch::core::utils::format_bytes;
///
/// assert_eq!(format_bytes(Some(512)), "512.0 B");
/// assert_eq!(format_bytes(Some(50 * 1024 * 1024)), "50.0 MB");
/// assert_eq!(format_bytes(None), "Unknown");
/// ```
pub fn format_bytes(bytes: Option<u64>) -> String {
    let Some(bytes) = bytes else {
        return "Unknown".to_string();
    };

    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}

/// Truncates a string to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(Some(0)), "0.0 B");
        assert_eq!(format_bytes(Some(1536)), "1.5 KB");
        assert_eq!(format_bytes(Some(80 * 1024 * 1024)), "80.0 MB");
        assert_eq!(format_bytes(Some(3 * 1024 * 1024 * 1024)), "3.0 GB");
        assert_eq!(format_bytes(Some(2048 * 1024 * 1024 * 1024)), "2.0 TB");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("привет мир", 6), "привет");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
