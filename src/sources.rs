//! Source strategy registry: which outlets are supported and how each
//! one is fetched and cleaned.
//!
//! Every supported outlet is described by a [`SourceStrategy`] record in
//! [`REGISTRY`]. Adding a source is a data change, not a code change: the
//! extraction engine and document compiler only ever consume the records.
//!
//! # Supported sources
//!
//! | Label | Domains | Fetch | Notes |
//! |-------|---------|-------|-------|
//! | 壹蘋網 | nextapple.com | Dynamic | minimal filtering |
//! | 中天網 | ctinews.com, ctitv.com.tw, cti.com.tw | Static | keyword filter |
//! | 知新聞 | knews.com.tw | Static | keyword filter |
//! | 東森網 | ebc.net.tw | Static | keyword filter |
//! | 周刊王 | ctwant.com | Static | re-fetches via browser when under-yielding |
//! | 三立網 | setn.com | Static | scoped content root |
//! | 東森雲 | ettoday.net | Static | scoped content root |
//! | 聯合新聞網 | udn.com | Dynamic | paragraph dedup |
//! | 中時新聞網 | chinatimes.com | Dynamic | waits for article body selector |
//! | 鏡報 | mirrordaily.news | Static | browser-like headers |
//! | TVBS | tvbs.com.tw | Static | aggressive promo-keyword filter |
//! | 鏡週刊 | mirrormedia.mg | Static | browser-like headers |
//! | 鏡新聞 | mnews.tw | Static | link/date filters |
//! | 自由時報 | ltn.com.tw | Static | link/date/caption filters |
//! | 中央社 | cna.com.tw | Static | link/date/caption filters |
//!
//! Matching is first-hit over an ordered list, so a more specific domain
//! must precede any generic one. The current table has no overlaps.

use crate::utils::hostname;

/// How raw markup is obtained for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One direct HTTP GET, no script execution.
    Static,
    /// Headless browser render, scripts executed before capture.
    Dynamic,
}

/// Per-source extraction configuration.
///
/// `min_chars` counts Unicode scalar values, not bytes; the rule data is
/// Chinese text. `exclude_patterns` are regex source strings compiled by
/// the normalizer.
#[derive(Debug)]
pub struct SourceStrategy {
    /// Domain substrings matched (case-insensitively) against the URL's
    /// hostname.
    pub domains: &'static [&'static str],
    pub fetch_mode: FetchMode,
    /// Tried in order; first selector with non-empty text wins.
    pub title_selectors: &'static [&'static str],
    /// Scope for paragraph search. `None` means the whole document.
    pub content_root: Option<&'static str>,
    /// Paragraphs shorter than this (in chars) are dropped.
    pub min_chars: usize,
    /// A paragraph containing any of these substrings is dropped.
    pub exclude_keywords: &'static [&'static str],
    /// Drop paragraphs containing a hyperlink child.
    pub exclude_linked: bool,
    /// Drop paragraphs matching any of these regexes (boilerplate such as
    /// embedded dates or photo-credit captions).
    pub exclude_patterns: &'static [&'static str],
    /// Remove later exact-duplicate paragraphs, keeping first occurrence.
    pub dedup_paragraphs: bool,
    /// Extra request headers, applied on the static fetch path.
    pub headers: &'static [(&'static str, &'static str)],
    /// Dynamic mode only: selector whose appearance signals the content
    /// has rendered.
    pub wait_for: Option<&'static str>,
    /// Re-run once via [`FetchMode::Dynamic`] when the static fetch yields
    /// fewer than three paragraphs.
    pub retry_with_dynamic: bool,
}

/// A registry entry: the label shown in the compiled document plus the
/// strategy used to extract from that outlet.
#[derive(Debug)]
pub struct Source {
    pub label: &'static str,
    pub strategy: SourceStrategy,
}

/// Date fragments like `2025.08.29` or `2025/08/29` embedded in body text.
pub const DATE_PATTERN: &str = r"\d{4}[./]\d{2}[./]\d{2}";
/// Trailing photo-credit captions like `（記者某某攝）`.
pub const CAPTION_PATTERN: &str = r"（[^）]*(?:攝|提供)[^）]*）$";
/// CNA's inline update markers like `(08/29 12:00 更新)`.
pub const UPDATE_PATTERN: &str = r"\(\d{2}/\d{2}\s+\d{2}:\d{2}\s+更新\)";

/// Header set presented to outlets that reject non-browser clients.
const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ),
    ("Accept-Language", "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    ("Referer", "https://www.google.com/"),
];

/// Baseline strategy the table entries override field-by-field.
const BASE: SourceStrategy = SourceStrategy {
    domains: &[],
    fetch_mode: FetchMode::Static,
    title_selectors: &["h1"],
    content_root: None,
    min_chars: 6,
    exclude_keywords: &[],
    exclude_linked: false,
    exclude_patterns: &[],
    dedup_paragraphs: false,
    headers: &[],
    wait_for: None,
    retry_with_dynamic: false,
};

/// Ordered strategy table. First matching entry wins.
pub static REGISTRY: &[Source] = &[
    Source {
        label: "壹蘋網",
        strategy: SourceStrategy {
            domains: &["nextapple.com"],
            fetch_mode: FetchMode::Dynamic,
            min_chars: 1,
            ..BASE
        },
    },
    Source {
        label: "中天網",
        strategy: SourceStrategy {
            domains: &["ctinews.com", "ctitv.com.tw", "cti.com.tw"],
            exclude_keywords: &[
                "標籤", "留言", "追蹤我們", "新聞分類", "影音專區", "關於我們",
                "客服資訊", "聯絡我們", "版權", "China Times Group",
            ],
            ..BASE
        },
    },
    Source {
        label: "知新聞",
        strategy: SourceStrategy {
            domains: &["knews.com.tw"],
            title_selectors: &["h1", "h2"],
            exclude_keywords: &[
                "延伸閱讀", "相關新聞", "版權", "客服", "追蹤", "推薦新聞",
                "下載", "App", "◎加入",
            ],
            ..BASE
        },
    },
    Source {
        label: "東森網",
        strategy: SourceStrategy {
            domains: &["ebc.net.tw"],
            exclude_keywords: &[
                "延伸閱讀", "相關新聞", "版權", "更多新聞", "App", "下載",
                "優惠", "折扣", "滿額", "品牌", "活動",
            ],
            ..BASE
        },
    },
    Source {
        label: "周刊王",
        strategy: SourceStrategy {
            domains: &["ctwant.com"],
            title_selectors: &["h1", "h2"],
            content_root: Some("div.article-content"),
            min_chars: 1,
            exclude_keywords: &[
                "延伸閱讀", "相關新聞", "更多精彩內容", "版權", "客服", "追蹤",
                "下載", "App", "立即訂閱", "精彩影音", "圖／", "請用微信掃描",
                "掃描 QR Code", "更多 CTWANT 報導", "安裝我們的 CTWANT APP",
                "下一則新聞", "人氣新聞", "關鍵熱搜", "隱私權政策", "©",
                "iPhone立即安裝", "Android立即安裝",
            ],
            retry_with_dynamic: true,
            ..BASE
        },
    },
    Source {
        label: "三立網",
        strategy: SourceStrategy {
            domains: &["setn.com"],
            title_selectors: &["h1", "h2"],
            content_root: Some("div.NewsContent, div.Content"),
            exclude_keywords: &[
                "保護被害人隱私", "拒絕家庭暴力", "請撥打110", "請撥打113",
                "彰化夫妻", "活春宮", "更多新聞", "延伸閱讀", "版權所有",
                "三立新聞網",
            ],
            ..BASE
        },
    },
    Source {
        label: "東森雲",
        strategy: SourceStrategy {
            domains: &["ettoday.net"],
            title_selectors: &["h1", "h2"],
            content_root: Some("div.story"),
            exclude_keywords: &[
                "延伸閱讀", "相關新聞", "更多新聞", "版權所有", "ETtoday新聞雲",
                "請用微信掃描", "掃描 QR Code", "安裝我們的 APP", "精彩影音",
                "隱私權政策", "©", "iPhone立即安裝", "Android立即安裝", "▲",
            ],
            ..BASE
        },
    },
    Source {
        label: "聯合新聞網",
        strategy: SourceStrategy {
            domains: &["udn.com"],
            fetch_mode: FetchMode::Dynamic,
            title_selectors: &["h1", "h2"],
            content_root: Some(
                "div.story-content, section.article-content__editor, div.article-content",
            ),
            min_chars: 1,
            dedup_paragraphs: true,
            ..BASE
        },
    },
    Source {
        label: "中時新聞網",
        strategy: SourceStrategy {
            domains: &["chinatimes.com"],
            fetch_mode: FetchMode::Dynamic,
            // Only the meta og:title is reliable once the page scripts run.
            title_selectors: &[],
            content_root: Some("div.article-body, div.article-content"),
            exclude_keywords: &[
                "延伸閱讀", "相關新聞", "更多新聞", "版權所有", "中時新聞網",
                "隱私權政策", "©", "App下載", "立即訂閱", "精彩影音",
            ],
            wait_for: Some("div.article-body, div.article-content"),
            ..BASE
        },
    },
    Source {
        label: "鏡報",
        strategy: SourceStrategy {
            domains: &["mirrordaily.news"],
            title_selectors: &["h1", "title"],
            content_root: Some(
                "article.brief, [itemprop=\"articleBody\"], div.articleBody",
            ),
            min_chars: 1,
            exclude_keywords: &[
                "猜你喜歡", "其他人都在看", "相關新聞", "延伸閱讀", "推薦",
                "更多", "追蹤", "分享", "版權", "隱私權", "服務條款", "留言",
                "訂閱", "App", "下載", "TOP", "返回", "社群", "熱門", "最新",
            ],
            dedup_paragraphs: true,
            headers: BROWSER_HEADERS,
            ..BASE
        },
    },
    Source {
        label: "TVBS",
        strategy: SourceStrategy {
            domains: &["tvbs.com.tw"],
            title_selectors: &["h1.title", "h1.news-title"],
            content_root: Some(
                "div#news_detail_div, div.article_content, div[align=\"center\"]",
            ),
            min_chars: 7,
            exclude_keywords: &[
                "延伸閱讀", "相關新聞", "更多新聞", "版權所有", "TVBS新聞網",
                "隱私權政策", "©", "App下載", "立即訂閱", "精彩影音", "◤",
                "👉", "優惠", "折扣", "滿額", "活動", "旅遊優惠",
                "加入TVBS新聞LINE", "TVBS鐵粉", "下載APP", "免費拿點數",
                "抽iPhone", "eSIM", "韓亞航空", "訂房最便宜", "省錢攻略",
            ],
            dedup_paragraphs: true,
            ..BASE
        },
    },
    Source {
        label: "鏡週刊",
        strategy: SourceStrategy {
            domains: &["mirrormedia.mg"],
            title_selectors: &["h1.story__title"],
            content_root: Some(
                "div.brief__BriefContainer-sc-e5902095-0, div.brief__BriefContainer, \
                 section.article-content__Wrapper-sc-f590bf19-0, \
                 section.article-content__Wrapper",
            ),
            min_chars: 7,
            exclude_keywords: &[
                "延伸閱讀", "相關新聞", "更多新聞", "版權所有", "鏡週刊",
                "隱私權政策", "©", "App下載", "立即訂閱", "精彩影音", "留言",
                "熱門新聞", "TOP", "返回", "社群分享", "翻攝", "照片", "圖片",
                "臉書", "Instagram",
            ],
            dedup_paragraphs: true,
            headers: BROWSER_HEADERS,
            ..BASE
        },
    },
    Source {
        label: "鏡新聞",
        strategy: SourceStrategy {
            domains: &["mnews.tw"],
            content_root: Some(
                "div.article-brief_briefWrapper__Gm_Bu, \
                 section.story_contentWrapper__dvkWW > article",
            ),
            exclude_linked: true,
            exclude_patterns: &[DATE_PATTERN],
            dedup_paragraphs: true,
            headers: BROWSER_HEADERS,
            ..BASE
        },
    },
    Source {
        label: "自由時報",
        strategy: SourceStrategy {
            domains: &["ltn.com.tw"],
            content_root: Some("div.text"),
            exclude_keywords: &["攝", "提供"],
            exclude_linked: true,
            exclude_patterns: &[DATE_PATTERN],
            dedup_paragraphs: true,
            headers: BROWSER_HEADERS,
            ..BASE
        },
    },
    Source {
        label: "中央社",
        strategy: SourceStrategy {
            domains: &["cna.com.tw"],
            content_root: Some("div.paragraph, div.article"),
            exclude_keywords: &["不得轉載", "版權", "翻攝照片"],
            exclude_linked: true,
            exclude_patterns: &[DATE_PATTERN, UPDATE_PATTERN, CAPTION_PATTERN],
            dedup_paragraphs: true,
            headers: BROWSER_HEADERS,
            ..BASE
        },
    },
];

/// Resolve a URL to its registered source.
///
/// A source matches when any of its domain substrings appears in the URL's
/// lowercased hostname; the first matching entry wins. `None` is a defined
/// outcome (unsupported source), not an error; the extraction engine
/// turns it into a sentinel body.
pub fn resolve(url: &str) -> Option<&'static Source> {
    let host = hostname(url)?;
    REGISTRY
        .iter()
        .find(|source| source.strategy.domains.iter().any(|d| host.contains(d)))
}

/// The document-facing source label for a URL: the registry label when
/// matched, otherwise the bare hostname, otherwise the URL itself.
pub fn label_for(url: &str) -> String {
    match resolve(url) {
        Some(source) => source.label.to_string(),
        None => hostname(url).unwrap_or_else(|| url.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_registered_domains() {
        let udn = resolve("https://www.udn.com/news/story/1/abc").unwrap();
        assert_eq!(udn.label, "聯合新聞網");
        assert_eq!(udn.strategy.fetch_mode, FetchMode::Dynamic);

        let cti = resolve("https://gotv.ctitv.com.tw/2025/08/article.html").unwrap();
        assert_eq!(cti.label, "中天網");
        assert_eq!(cti.strategy.fetch_mode, FetchMode::Static);
    }

    #[test]
    fn test_resolve_is_case_insensitive_on_hostname() {
        let src = resolve("https://News.LTN.com.TW/news/society/1").unwrap();
        assert_eq!(src.label, "自由時報");
    }

    #[test]
    fn test_resolve_matches_hostname_not_path() {
        // The domain substring appearing only in the path must not match.
        assert!(resolve("https://example.com/udn.com/story").is_none());
    }

    #[test]
    fn test_resolve_unknown_host_is_none() {
        assert!(resolve("https://example.com/article").is_none());
        assert!(resolve("not a url").is_none());
    }

    #[test]
    fn test_label_for_falls_back_to_hostname() {
        assert_eq!(label_for("https://www.setn.com/News.aspx?NewsID=1"), "三立網");
        assert_eq!(label_for("https://blog.example.org/post"), "blog.example.org");
    }

    #[test]
    fn test_retry_capable_source() {
        let ctwant = resolve("https://www.ctwant.com/article/123").unwrap();
        assert!(ctwant.strategy.retry_with_dynamic);
        assert_eq!(ctwant.strategy.fetch_mode, FetchMode::Static);
    }

    #[test]
    fn test_exclude_patterns_compile() {
        for source in REGISTRY {
            for pattern in source.strategy.exclude_patterns {
                assert!(
                    regex::Regex::new(pattern).is_ok(),
                    "bad pattern for {}: {pattern}",
                    source.label
                );
            }
        }
    }

    #[test]
    fn test_selectors_parse() {
        for source in REGISTRY {
            for sel in source.strategy.title_selectors {
                assert!(
                    scraper::Selector::parse(sel).is_ok(),
                    "bad title selector for {}: {sel}",
                    source.label
                );
            }
            if let Some(root) = source.strategy.content_root {
                assert!(
                    scraper::Selector::parse(root).is_ok(),
                    "bad content root for {}: {root}",
                    source.label
                );
            }
            if let Some(wait) = source.strategy.wait_for {
                assert!(
                    scraper::Selector::parse(wait).is_ok(),
                    "bad wait selector for {}: {wait}",
                    source.label
                );
            }
        }
    }
}
