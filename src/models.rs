//! Core data structures shared across the extraction, queue, and
//! compilation stages.
//!
//! - [`ArticleReference`]: what the curation queue stores (url + title)
//! - [`ExtractionResult`]: normalized title + ordered body paragraphs
//! - [`ListedEntry`]: one row of the user-visible queue listing
//!
//! The sentinel strings mirror the user-facing language of the supported
//! outlets; they are data, not log text, and end up inside the exported
//! document verbatim.

use serde::Serialize;

/// Title sentinel used when no title selector (nor the page-level meta
/// fallback) matched.
pub const UNRESOLVED_TITLE: &str = "（未能抓取標題）";

/// Body sentinel for URLs whose hostname matches no registered source.
pub const UNSUPPORTED_SOURCE: &str = "（目前尚未支援此來源）";

/// A queued article: the url it was submitted as, plus the title the
/// extraction engine resolved at submission time.
///
/// Identity for dedup purposes is `url` OR `title` equality; either match
/// counts as a duplicate. Entries are immutable once stored; the only
/// mutations are explicit removal and reordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleReference {
    pub url: String,
    pub title: String,
}

impl ArticleReference {
    /// True if `other` collides with this entry under the loose dedup
    /// policy (same url or same title).
    pub fn collides_with(&self, other: &ArticleReference) -> bool {
        self.url == other.url || self.title == other.title
    }
}

/// The normalized output of one extraction: a title and the surviving
/// body paragraphs in document order.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub title: String,
    pub body_lines: Vec<String>,
}

impl ExtractionResult {
    /// Wrap a failure message as a degenerate result whose title carries
    /// the message. Keeps the best-effort contract: callers downstream
    /// (queue, compiler) see ordinary text, never an error.
    pub fn from_failure(message: impl Into<String>) -> Self {
        Self {
            title: message.into(),
            body_lines: Vec::new(),
        }
    }

    /// Title plus body joined as one text block, one logical line per
    /// element, title first.
    pub fn rendered(&self) -> String {
        let mut lines = Vec::with_capacity(1 + self.body_lines.len());
        lines.push(self.title.clone());
        lines.extend(self.body_lines.iter().cloned());
        lines.join("\n")
    }
}

/// One row of the boundary `list()` output: 1-based position, title, url.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListedEntry {
    pub position: usize,
    pub title: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collides_on_url_or_title() {
        let a = ArticleReference {
            url: "https://a.example/1".into(),
            title: "地方新聞".into(),
        };
        let same_url = ArticleReference {
            url: "https://a.example/1".into(),
            title: "完全不同的標題".into(),
        };
        let same_title = ArticleReference {
            url: "https://b.example/2".into(),
            title: "地方新聞".into(),
        };
        let distinct = ArticleReference {
            url: "https://b.example/3".into(),
            title: "另一則".into(),
        };
        assert!(a.collides_with(&same_url));
        assert!(a.collides_with(&same_title));
        assert!(!a.collides_with(&distinct));
    }

    #[test]
    fn test_rendered_is_title_first() {
        let r = ExtractionResult {
            title: "標題".into(),
            body_lines: vec!["第一段".into(), "第二段".into()],
        };
        assert_eq!(r.rendered(), "標題\n第一段\n第二段");
    }

    #[test]
    fn test_failure_result_renders_message_only() {
        let r = ExtractionResult::from_failure("（網路錯誤: timeout）");
        assert_eq!(r.rendered(), "（網路錯誤: timeout）");
        assert!(r.body_lines.is_empty());
    }
}
