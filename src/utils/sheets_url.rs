//! Google Sheets URL helpers

use std::sync::OnceLock;
use regex::Regex;

fn sheet_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"https://docs\.google\.com/spreadsheets/d/([a-zA-Z0-9_-]+)")
            .unwrap_or_else(|_| unreachable!("static sheet url pattern is valid"))
    })
}

fn sheet_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap_or_else(|_| unreachable!("static sheet id pattern is valid"))
    })
}

/// Extract the spreadsheet id from a Google Sheets URL
pub fn extract_sheet_id(url: &str) -> Option<String> {
    sheet_url_regex()
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Check a URL and return the id it carries, if any
pub fn validate_sheet_url(url: &str) -> (bool, Option<String>) {
    match extract_sheet_id(url) {
        Some(id) => (true, Some(id)),
        None => (false, None),
    }
}

/// Canonical edit URL for a spreadsheet id
pub fn format_sheet_url(sheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{}/edit", sheet_id)
}

/// Accept either a bare spreadsheet id or a full URL and return the id
pub fn sheet_id_or_url(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if sheet_id_regex().is_match(input) {
        return Some(input.to_string());
    }
    extract_sheet_id(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_extract_from_edit_url() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC-d_E9/edit#gid=0";
        assert_eq!(extract_sheet_id(url), Some("1AbC-d_E9".to_string()));
        assert_eq!(validate_sheet_url(url), (true, Some("1AbC-d_E9".to_string())));
    }

    #[test]
    fn test_rejects_other_urls() {
        assert_eq!(extract_sheet_id("https://example.com/spreadsheets/d/abc"), None);
        assert_eq!(validate_sheet_url("not a url"), (false, None));
    }

    #[test]
    fn test_sheet_id_or_url() {
        assert_eq!(sheet_id_or_url("abc123"), Some("abc123".to_string()));
        assert_eq!(
            sheet_id_or_url("https://docs.google.com/spreadsheets/d/xyz/edit"),
            Some("xyz".to_string())
        );
        assert_eq!(sheet_id_or_url(""), None);
        assert_eq!(sheet_id_or_url("has spaces"), None);
    }

    proptest! {
        #[test]
        fn formatted_url_round_trips(id in "[a-zA-Z0-9_-]{1,44}") {
            prop_assert_eq!(extract_sheet_id(&format_sheet_url(&id)), Some(id));
        }
    }
}
