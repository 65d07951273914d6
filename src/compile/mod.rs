//! Document compiler: turn an ordered list of URLs into one multi-section
//! Word clipping document.
//!
//! The template contributes exactly one title paragraph and one
//! metadata/body table. The first article reuses those blocks in place;
//! every further article appends deep copies of the prototypes, so the
//! compiled document carries N blocks for N URLs in input order. Each
//! table gets its date cell (ROC calendar), source label, 1-based
//! sequence number, fixed category, and the extraction engine's output
//! (or a failure placeholder, because per-URL failures never abort the
//! batch). Only a missing template is fatal.

pub mod template;

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, instrument, warn};

use crate::browser::BrowserGuard;
use crate::error::ClipError;
use crate::extract::Engine;
use crate::sources::{self, FetchMode};
use crate::utils::roc_date;
use template::{DocxTemplate, body_spans, paragraph_xml, set_cell};

/// Category cell content. The clipping workflow files everything under
/// the society desk; making this configurable is future work the
/// template contract does not yet need.
pub const FIXED_CATEGORY: &str = "社會";

/// The values written into one article block.
#[derive(Debug, Clone)]
pub struct BlockFields {
    pub date: String,
    pub source: String,
    pub seq: String,
    pub category: String,
    pub body: String,
}

impl BlockFields {
    /// Fields for the article at 0-based `index`, with `body` already
    /// extracted (or already a failure placeholder).
    pub fn new(index: usize, url: &str, date: &str, body: String) -> Self {
        Self {
            date: date.to_string(),
            source: sources::label_for(url),
            seq: (index + 1).to_string(),
            category: FIXED_CATEGORY.to_string(),
            body,
        }
    }
}

/// Compile the queued URLs into a document at `output_path`.
///
/// Extraction runs sequentially in submission order so block numbering
/// matches input order. When the job contains any browser-rendered URL,
/// one shared browser session is acquired up front, reused for every
/// dynamic fetch, and closed when the job ends.
#[instrument(level = "info", skip_all, fields(count = urls.len(), output = %output_path.display()))]
pub async fn compile(
    engine: &Engine,
    urls: &[String],
    template_path: &Path,
    output_path: &Path,
) -> Result<PathBuf, ClipError> {
    if urls.is_empty() {
        return Err(ClipError::EmptyQueue);
    }
    // Template load failure aborts the whole job before any fetch.
    let docx = DocxTemplate::load(template_path)?;

    // The guard also covers abandonment: if this future is dropped
    // mid-batch, its Drop reclaims the session instead of leaking the
    // browser process.
    let browser = if urls.iter().any(|u| wants_browser(u)) {
        match BrowserGuard::acquire().await {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!(error = %e, "shared browser unavailable; dynamic fetches fall back to ephemeral engines");
                None
            }
        }
    } else {
        None
    };

    let date = roc_date(Local::now().date_naive());
    let mut blocks = Vec::with_capacity(urls.len());
    for (index, url) in urls.iter().enumerate() {
        let result = engine
            .extract(url, browser.as_ref().and_then(|g| g.manager()))
            .await;
        blocks.push(BlockFields::new(index, url, &date, result.rendered()));
    }

    // Orderly teardown on the normal path, before writing output.
    if let Some(guard) = browser {
        guard.close().await;
    }

    let document_xml = render_document(&docx.document_xml, &blocks)?;
    docx.write(output_path, &document_xml)?;
    info!(blocks = blocks.len(), "clipping document written");
    Ok(output_path.to_path_buf())
}

/// Pure assembly step: clone the template's prototype blocks once per
/// article and fill their cells. Separated from [`compile`] so document
/// shape is testable without any network or browser.
pub fn render_document(document_xml: &str, blocks: &[BlockFields]) -> Result<String, ClipError> {
    if blocks.is_empty() {
        return Err(ClipError::EmptyQueue);
    }
    let spans = body_spans(document_xml)?;
    let title_proto = &document_xml[spans.title_block.clone()];
    let table_proto = &document_xml[spans.table.clone()];

    let mut filled = Vec::with_capacity(blocks.len());
    for block in blocks {
        filled.push(fill_table(table_proto, block)?);
    }

    let mut out = String::with_capacity(document_xml.len() + table_proto.len() * blocks.len());
    // First block reuses the template's own title paragraph and table.
    out.push_str(&document_xml[..spans.table.start]);
    out.push_str(&filled[0]);
    out.push_str(&document_xml[spans.table.end..spans.insert_at]);
    // Later blocks are appended clones of the prototypes.
    for table in filled.iter().skip(1) {
        out.push_str(title_proto);
        out.push_str(table);
    }
    out.push_str(&document_xml[spans.insert_at..]);
    Ok(out)
}

/// Cell coordinates are the template contract: row 0 holds date /
/// source / sequence at columns 1, 3, 5; row 1 holds the category at
/// column 1; row 2 is the full-width body cell.
fn fill_table(table_proto: &str, block: &BlockFields) -> Result<String, ClipError> {
    let mut table = set_cell(table_proto, 0, 1, &paragraph_xml(&block.date, true))?;
    table = set_cell(&table, 0, 3, &paragraph_xml(&block.source, true))?;
    table = set_cell(&table, 0, 5, &paragraph_xml(&block.seq, true))?;
    table = set_cell(&table, 1, 1, &paragraph_xml(&block.category, true))?;
    table = set_cell(&table, 2, 0, &paragraph_xml(&block.body, false))?;
    Ok(table)
}

fn wants_browser(url: &str) -> bool {
    sources::resolve(url)
        .map(|s| {
            s.strategy.fetch_mode == FetchMode::Dynamic || s.strategy.retry_with_dynamic
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(content: &str) -> String {
        format!("<w:tc><w:tcPr><w:tcW/></w:tcPr><w:p><w:r><w:t>{content}</w:t></w:r></w:p></w:tc>")
    }

    /// A document.xml with the template's contractual shape: one title
    /// paragraph, one 6-column metadata table with a category row and a
    /// body row, then section properties.
    fn template_xml() -> String {
        let row0: String = ["日期", "", "來源", "", "頁次", ""]
            .iter()
            .map(|c| cell(c))
            .collect();
        let row1: String = ["版別", ""].iter().map(|c| cell(c)).collect();
        let row2 = cell("");
        format!(
            "<?xml version=\"1.0\"?><w:document><w:body>\
             <w:p><w:r><w:t>新聞剪報</w:t></w:r></w:p>\
             <w:tbl><w:tblPr/><w:tr>{row0}</w:tr><w:tr>{row1}</w:tr><w:tr>{row2}</w:tr></w:tbl>\
             <w:sectPr/></w:body></w:document>"
        )
    }

    fn blocks_for(urls: &[&str]) -> Vec<BlockFields> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| BlockFields::new(i, url, "115-08-29", format!("內文{}", i + 1)))
            .collect()
    }

    #[test]
    fn test_three_urls_give_three_blocks_in_order() {
        let doc = template_xml();
        let blocks = blocks_for(&[
            "https://www.udn.com/news/story/1/a",
            "https://www.setn.com/News.aspx?NewsID=2",
            "https://unknown.example.org/c",
        ]);
        let out = render_document(&doc, &blocks).unwrap();

        assert_eq!(out.matches("<w:tbl>").count(), 3);
        // One title paragraph per block.
        assert_eq!(out.matches(">新聞剪報</w:t>").count(), 3);
        // Sequence cells read 1..=3 in input order.
        let p1 = out.find(">1</w:t>").unwrap();
        let p2 = out.find(">2</w:t>").unwrap();
        let p3 = out.find(">3</w:t>").unwrap();
        assert!(p1 < p2 && p2 < p3);
        // Source labels follow the domain mapping, with hostname fallback.
        assert!(out.contains(">聯合新聞網</w:t>"));
        assert!(out.contains(">三立網</w:t>"));
        assert!(out.contains(">unknown.example.org</w:t>"));
        // Appended clones land before the section properties.
        let sect = out.find("<w:sectPr/>").unwrap();
        assert!(out.rfind("<w:tbl>").unwrap() < sect);
    }

    #[test]
    fn test_block_fields_carry_fixed_category_and_roc_date() {
        let block = BlockFields::new(0, "https://www.ltn.com.tw/x", "115-08-29", "內文".into());
        assert_eq!(block.category, "社會");
        assert_eq!(block.date, "115-08-29");
        assert_eq!(block.seq, "1");
        assert_eq!(block.source, "自由時報");
    }

    #[test]
    fn test_body_cell_carries_extraction_output() {
        let doc = template_xml();
        let blocks = vec![BlockFields::new(
            0,
            "https://www.cna.com.tw/news/1",
            "115-08-29",
            "標題\n第一段\n第二段".into(),
        )];
        let out = render_document(&doc, &blocks).unwrap();
        assert!(out.contains(">標題</w:t>"));
        assert!(out.contains(">第一段</w:t>"));
        assert_eq!(out.matches("<w:br/>").count(), 2);
    }

    #[test]
    fn test_failure_placeholder_still_yields_a_block() {
        let doc = template_xml();
        let blocks = vec![BlockFields::new(
            0,
            "https://www.ebc.net.tw/news/1",
            "115-08-29",
            "（網路錯誤: timed out after 15 seconds）".into(),
        )];
        let out = render_document(&doc, &blocks).unwrap();
        assert_eq!(out.matches("<w:tbl>").count(), 1);
        assert!(out.contains("（網路錯誤: timed out after 15 seconds）"));
    }

    #[test]
    fn test_empty_block_list_is_rejected() {
        let doc = template_xml();
        assert!(matches!(
            render_document(&doc, &[]),
            Err(ClipError::EmptyQueue)
        ));
    }

    #[test]
    fn test_template_stays_intact_across_blocks() {
        // Every appended clone is a fresh copy of the prototype, so cell
        // fills in one block must not leak into the next.
        let doc = template_xml();
        let blocks = blocks_for(&[
            "https://www.udn.com/news/story/1/a",
            "https://www.udn.com/news/story/1/b",
        ]);
        let out = render_document(&doc, &blocks).unwrap();
        assert!(out.contains(">內文1</w:t>"));
        assert!(out.contains(">內文2</w:t>"));
        assert_eq!(out.matches(">內文1</w:t>").count(), 1);
    }

    #[tokio::test]
    async fn test_compile_without_template_is_fatal() {
        let engine = Engine::with_defaults().unwrap();
        let err = compile(
            &engine,
            &["https://www.udn.com/news/story/1/a".to_string()],
            Path::new("/nonexistent/範本.docx"),
            Path::new("/tmp/never_written.docx"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClipError::TemplateMissing(_)));
    }

    #[tokio::test]
    async fn test_compile_empty_queue_is_rejected_before_template_check() {
        let engine = Engine::with_defaults().unwrap();
        let err = compile(
            &engine,
            &[],
            Path::new("/nonexistent/範本.docx"),
            Path::new("/tmp/never_written.docx"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClipError::EmptyQueue));
    }
}
