//! Helper functions for URL detection, hostnames, date formatting, and
//! log-friendly string truncation.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(https?://\S+)").unwrap());

/// Extract the first http(s) URL from free text.
///
/// Submitted messages often carry the URL surrounded by commentary; only
/// the first well-formed `http://` / `https://` token is taken. Returns
/// `None` when the text contains no URL at all; callers reject such
/// input before it ever reaches the extraction engine.
pub fn extract_first_url(text: &str) -> Option<&str> {
    URL_RE.find(text).map(|m| m.as_str())
}

/// Lowercased hostname of a URL, or `None` if the URL does not parse or
/// has no host.
pub fn hostname(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Format a date in Republic-of-China calendar notation: the year is
/// offset by 1911, so 2026-08-29 renders as `115-08-29`.
pub fn roc_date(date: NaiveDate) -> String {
    format!("{}-{:02}-{:02}", date.year() - 1911, date.month(), date.day())
}

/// Truncate a string for logging purposes.
///
/// The truncation respects char boundaries; the suffix reports how many
/// bytes were dropped.
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    let cut = s
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if cut >= s.len() {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_first_url() {
        assert_eq!(
            extract_first_url("看看這則 https://www.udn.com/news/story/1/abc 很誇張"),
            Some("https://www.udn.com/news/story/1/abc")
        );
        assert_eq!(extract_first_url("not a url"), None);
        assert_eq!(extract_first_url(""), None);
        assert_eq!(
            extract_first_url("http://a.example/x and https://b.example/y"),
            Some("http://a.example/x")
        );
    }

    #[test]
    fn test_hostname() {
        assert_eq!(
            hostname("https://WWW.UDN.com/news/story/1/abc"),
            Some("www.udn.com".to_string())
        );
        assert_eq!(hostname("not a url"), None);
    }

    #[test]
    fn test_roc_date() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        assert_eq!(roc_date(d), "115-08-29");
        let d = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        assert_eq!(roc_date(d), "114-01-03");
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 100), "short");
        let long = "a".repeat(500);
        let out = truncate_for_log(&long, 100);
        assert!(out.starts_with(&"a".repeat(100)));
        assert!(out.contains("…(+400 bytes)"));
        // multi-byte safety
        let zh = "中文字串測試".repeat(10);
        let out = truncate_for_log(&zh, 5);
        assert!(out.starts_with("中文字串測"));
    }
}
