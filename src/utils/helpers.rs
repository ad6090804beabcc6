//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};
use rand::Rng;

/// Truncate text to a maximum number of characters with ellipsis
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_length.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Cut text to at most `max_chars` characters without adding anything
pub fn clip_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Lower-case and trim an email address for storage and comparison
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Compare two secrets without short-circuiting on the first differing byte
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Split a comma separated cell into trimmed, non-empty entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// First word of a full name, or "there" for greetings
pub fn first_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .next()
        .map(str::to_string)
        .unwrap_or_else(|| "there".to_string())
}

/// Generate a URL-safe random token (43 characters, ~256 bits)
pub fn generate_unsubscribe_token() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                            abcdefghijklmnopqrstuvwxyz\
                            0123456789-_";
    let mut rng = rand::thread_rng();

    (0..43)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Escape text for inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Current date in the schedule's time zone
pub fn today_with_offset(offset_hours: i32) -> NaiveDate {
    now_with_offset(offset_hours).date_naive()
}

/// Current time in the schedule's time zone
pub fn now_with_offset(offset_hours: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Format a date as `MM/DD`
pub fn format_mmdd(date: NaiveDate) -> String {
    date.format("%m/%d").to_string()
}

/// Format a timestamp for display
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 8), "hello...");
        assert_eq!(truncate_text("xin chào các bạn", 7), "xin ...");
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("volunteer@example.com"));
        assert!(!is_valid_email("volunteer.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@example."));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"service-key", b"service-key"));
        assert!(!constant_time_eq(b"service-key", b"service-kez"));
        assert!(!constant_time_eq(b"service-key", b"service-key-longer"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("Teacher, Teaching Assistant ,,Admin"),
            vec!["Teacher", "Teaching Assistant", "Admin"]
        );
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn test_first_name() {
        assert_eq!(first_name("Lan Nguyen"), "Lan");
        assert_eq!(first_name("   "), "there");
    }

    #[test]
    fn test_unsubscribe_token_shape() {
        let token = generate_unsubscribe_token();
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_unsubscribe_token());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>Tom & Jerry</b>"), "&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;");
    }

    #[test]
    fn test_week_start() {
        let wednesday = NaiveDate::from_ymd_opt(2025, 7, 16).unwrap();
        assert_eq!(week_start(wednesday), NaiveDate::from_ymd_opt(2025, 7, 14).unwrap());
        let monday = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();
        assert_eq!(week_start(monday), monday);
        assert_eq!(format_mmdd(monday), "07/14");
    }
}
