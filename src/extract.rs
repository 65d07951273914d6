//! Content normalization and the extraction engine.
//!
//! [`normalize`] turns raw markup plus a [`SourceStrategy`] into an
//! [`ExtractionResult`]: title resolution over an ordered selector list
//! (with a page-level meta fallback), then a paragraph filter chain
//! (empty text, minimum length, exclude keywords, hyperlink children,
//! boilerplate regexes) with optional exact-text dedup that preserves
//! first occurrences.
//!
//! [`Engine::extract`] orchestrates registry → rendering backend →
//! normalizer. It is best-effort by contract: network and render failures
//! are converted into placeholder text so a batch caller can always
//! proceed, and retry-capable sources get one dynamic re-fetch when a
//! static fetch under-yields.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

use crate::browser::BrowserManager;
use crate::error::ClipError;
use crate::fetch::Backend;
use crate::models::{ExtractionResult, UNRESOLVED_TITLE, UNSUPPORTED_SOURCE};
use crate::sources::{self, FetchMode, SourceStrategy};

/// A static fetch that yields fewer paragraphs than this is considered
/// under-yielding for retry-capable sources.
const RETRY_MIN_PARAGRAPHS: usize = 3;

static P_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static A_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static META_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[name="title"]"#).unwrap());

/// Normalize raw markup under a source strategy.
pub fn normalize(html: &str, strategy: &SourceStrategy) -> ExtractionResult {
    let document = Html::parse_document(html);
    let title = resolve_title(&document, strategy);
    let body_lines = resolve_body(&document, strategy);
    ExtractionResult { title, body_lines }
}

/// Try the strategy's selectors in order, then the page-level meta
/// fallbacks, then the unresolved sentinel.
fn resolve_title(document: &Html, strategy: &SourceStrategy) -> String {
    for raw in strategy.title_selectors {
        let Ok(selector) = Selector::parse(raw) else {
            warn!(selector = raw, "unparsable title selector; skipping");
            continue;
        };
        if let Some(text) = document
            .select(&selector)
            .map(element_text)
            .find(|t| !t.is_empty())
        {
            return text;
        }
    }
    for meta in [&*OG_TITLE, &*META_TITLE] {
        if let Some(content) = document
            .select(meta)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty())
        {
            return content.to_string();
        }
    }
    UNRESOLVED_TITLE.to_string()
}

fn resolve_body(document: &Html, strategy: &SourceStrategy) -> Vec<String> {
    let patterns: Vec<Regex> = strategy
        .exclude_patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();

    // Scope to the content root when one matches; otherwise search the
    // whole document.
    let roots: Vec<ElementRef> = match strategy.content_root {
        Some(raw) => match Selector::parse(raw) {
            Ok(selector) => document.select(&selector).collect(),
            Err(_) => {
                warn!(selector = raw, "unparsable content root; using whole document");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let paragraphs: Vec<ElementRef> = if roots.is_empty() {
        document.select(&P_SELECTOR).collect()
    } else {
        roots
            .iter()
            .flat_map(|root| root.select(&P_SELECTOR))
            .collect()
    };

    let kept = paragraphs
        .into_iter()
        .filter(|p| !(strategy.exclude_linked && p.select(&A_SELECTOR).next().is_some()))
        .map(|p| element_text(p))
        .filter(|text| !text.is_empty())
        .filter(|text| text.chars().count() >= strategy.min_chars)
        .filter(|text| !strategy.exclude_keywords.iter().any(|kw| text.contains(kw)))
        .filter(|text| !patterns.iter().any(|re| re.is_match(text)));

    if strategy.dedup_paragraphs {
        kept.unique().collect()
    } else {
        kept.collect()
    }
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// The extraction engine: registry → backend → normalizer, best-effort.
pub struct Engine {
    backend: Backend,
}

impl Engine {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn with_defaults() -> Result<Self, ClipError> {
        Ok(Self::new(Backend::with_defaults()?))
    }

    /// Extract a normalized article from a URL.
    ///
    /// Never fails: an unsupported source yields the sentinel body, and
    /// network, timeout, or render failures yield a placeholder embedding
    /// the cause. Pass a pooled [`BrowserManager`] to reuse one engine
    /// across a batch of dynamic fetches.
    #[instrument(level = "info", skip(self, browser), fields(%url))]
    pub async fn extract(&self, url: &str, browser: Option<&BrowserManager>) -> ExtractionResult {
        let Some(source) = sources::resolve(url) else {
            let host = crate::utils::hostname(url).unwrap_or_else(|| url.to_string());
            return failure_placeholder(&ClipError::UnsupportedSource(host));
        };
        let strategy = &source.strategy;
        debug!(source = source.label, mode = ?strategy.fetch_mode, "strategy resolved");

        let html = match self.render(url, strategy, browser).await {
            Ok(html) => html,
            Err(e) => return failure_placeholder(&e),
        };
        let mut result = normalize(&html, strategy);

        // One dynamic re-fetch when a retry-capable static fetch
        // under-yields; the re-run's output is accepted as-is.
        if strategy.retry_with_dynamic
            && strategy.fetch_mode == FetchMode::Static
            && result.body_lines.len() < RETRY_MIN_PARAGRAPHS
        {
            info!(
                paragraphs = result.body_lines.len(),
                "static fetch under-yielded; retrying via browser render"
            );
            match self
                .backend
                .fetch_dynamic(url, strategy.wait_for, browser)
                .await
            {
                Ok(html) => result = normalize(&html, strategy),
                Err(e) => return failure_placeholder(&e),
            }
        }

        info!(
            title = %crate::utils::truncate_for_log(&result.title, 40),
            paragraphs = result.body_lines.len(),
            "extraction complete"
        );
        result
    }

    async fn render(
        &self,
        url: &str,
        strategy: &SourceStrategy,
        browser: Option<&BrowserManager>,
    ) -> Result<String, ClipError> {
        match strategy.fetch_mode {
            FetchMode::Static => self.backend.fetch_static(url, strategy.headers).await,
            FetchMode::Dynamic => {
                self.backend
                    .fetch_dynamic(url, strategy.wait_for, browser)
                    .await
            }
        }
    }
}

fn failure_placeholder(error: &ClipError) -> ExtractionResult {
    warn!(%error, "extraction failed; yielding placeholder");
    let message = match error {
        ClipError::UnsupportedSource(_) => UNSUPPORTED_SOURCE.to_string(),
        ClipError::Network(_) | ClipError::Timeout(_) => format!("（網路錯誤: {error}）"),
        _ => format!("（抓取失敗: {error}）"),
    };
    ExtractionResult::from_failure(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{DATE_PATTERN, FetchMode};

    const PLAIN: SourceStrategy = SourceStrategy {
        domains: &["test.example"],
        fetch_mode: FetchMode::Static,
        title_selectors: &["h1"],
        content_root: None,
        min_chars: 1,
        exclude_keywords: &[],
        exclude_linked: false,
        exclude_patterns: &[],
        dedup_paragraphs: false,
        headers: &[],
        wait_for: None,
        retry_with_dynamic: false,
    };

    #[test]
    fn test_title_selector_order() {
        let html = "<html><body><h2>次標</h2><h1>主標</h1></body></html>";
        let strategy = SourceStrategy {
            title_selectors: &["h1", "h2"],
            ..PLAIN
        };
        assert_eq!(normalize(html, &strategy).title, "主標");
    }

    #[test]
    fn test_title_falls_back_to_og_meta() {
        let html = r#"<html><head><meta property="og:title" content="社會版頭條"></head>
            <body><p>內文段落在這裡。</p></body></html>"#;
        assert_eq!(normalize(html, &PLAIN).title, "社會版頭條");
    }

    #[test]
    fn test_title_sentinel_when_nothing_matches() {
        let html = "<html><body><p>只有內文沒有標題。</p></body></html>";
        assert_eq!(normalize(html, &PLAIN).title, "（未能抓取標題）");
    }

    #[test]
    fn test_min_chars_counts_chars_not_bytes() {
        // Five Chinese chars is 15 bytes; a min of 6 chars must drop it.
        let html = "<html><body><h1>t</h1><p>五個中文字</p><p>足足有六個字了</p></body></html>";
        let strategy = SourceStrategy {
            min_chars: 6,
            ..PLAIN
        };
        let result = normalize(html, &strategy);
        assert_eq!(result.body_lines, vec!["足足有六個字了"]);
        for line in &result.body_lines {
            assert!(line.chars().count() >= 6);
        }
    }

    #[test]
    fn test_exclude_keywords() {
        let html = "<html><body>\
            <p>這是正常的新聞段落內容。</p>\
            <p>延伸閱讀：其他新聞連結</p>\
            <p>版權所有，不得轉載。</p>\
            </body></html>";
        let strategy = SourceStrategy {
            exclude_keywords: &["延伸閱讀", "版權"],
            ..PLAIN
        };
        let result = normalize(html, &strategy);
        assert_eq!(result.body_lines, vec!["這是正常的新聞段落內容。"]);
        for kw in ["延伸閱讀", "版權"] {
            assert!(result.body_lines.iter().all(|l| !l.contains(kw)));
        }
    }

    #[test]
    fn test_exclude_linked_paragraphs() {
        let html = "<html><body>\
            <p>純文字的段落保留下來。</p>\
            <p>含有<a href=\"/x\">超連結</a>的段落要丟掉。</p>\
            </body></html>";
        let strategy = SourceStrategy {
            exclude_linked: true,
            ..PLAIN
        };
        let result = normalize(html, &strategy);
        assert_eq!(result.body_lines, vec!["純文字的段落保留下來。"]);
    }

    #[test]
    fn test_exclude_patterns_drop_dates() {
        let html = "<html><body>\
            <p>記者會在下午召開，說明案情進度。</p>\
            <p>2025/08/29 06:00</p>\
            </body></html>";
        let strategy = SourceStrategy {
            exclude_patterns: &[DATE_PATTERN],
            ..PLAIN
        };
        let result = normalize(html, &strategy);
        assert_eq!(result.body_lines, vec!["記者會在下午召開，說明案情進度。"]);
    }

    #[test]
    fn test_dedup_preserves_first_occurrence_order() {
        let html = "<html><body>\
            <p>甲段落</p><p>乙段落</p><p>甲段落</p><p>丙段落</p><p>乙段落</p>\
            </body></html>";
        let strategy = SourceStrategy {
            dedup_paragraphs: true,
            ..PLAIN
        };
        let result = normalize(html, &strategy);
        assert_eq!(result.body_lines, vec!["甲段落", "乙段落", "丙段落"]);
    }

    #[test]
    fn test_without_dedup_duplicates_survive() {
        let html = "<html><body><p>同一段</p><p>同一段</p></body></html>";
        let result = normalize(html, &PLAIN);
        assert_eq!(result.body_lines, vec!["同一段", "同一段"]);
    }

    #[test]
    fn test_content_root_scopes_search() {
        let html = "<html><body>\
            <div class=\"sidebar\"><p>側欄雜訊文字</p></div>\
            <div class=\"article-content\"><p>正文第一段。</p><p>正文第二段。</p></div>\
            </body></html>";
        let strategy = SourceStrategy {
            content_root: Some("div.article-content"),
            ..PLAIN
        };
        let result = normalize(html, &strategy);
        assert_eq!(result.body_lines, vec!["正文第一段。", "正文第二段。"]);
    }

    #[test]
    fn test_missing_content_root_falls_back_to_document() {
        let html = "<html><body><p>整頁搜尋撈到的段落。</p></body></html>";
        let strategy = SourceStrategy {
            content_root: Some("div.never-matches"),
            ..PLAIN
        };
        let result = normalize(html, &strategy);
        assert_eq!(result.body_lines, vec!["整頁搜尋撈到的段落。"]);
    }

    #[test]
    fn test_empty_text_dropped_before_length_check() {
        let html = "<html><body><p>   </p><p></p><p>有內容的段落。</p></body></html>";
        let result = normalize(html, &PLAIN);
        assert_eq!(result.body_lines, vec!["有內容的段落。"]);
    }

    #[test]
    fn test_failure_placeholder_messages() {
        assert_eq!(
            failure_placeholder(&ClipError::UnsupportedSource("example.com".into())).title,
            "（目前尚未支援此來源）"
        );
        assert_eq!(
            failure_placeholder(&ClipError::Timeout(15)).title,
            "（網路錯誤: timed out after 15 seconds）"
        );
        assert_eq!(
            failure_placeholder(&ClipError::Browser("launch failed".into())).title,
            "（抓取失敗: browser error: launch failed）"
        );
    }

    #[tokio::test]
    async fn test_extract_unsupported_source_is_sentinel_not_error() {
        let engine = Engine::with_defaults().unwrap();
        let result = engine.extract("https://example.com/story", None).await;
        assert_eq!(result.rendered(), "（目前尚未支援此來源）");
    }
}
