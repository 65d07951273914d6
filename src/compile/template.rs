//! Word template handling: archive I/O and WordprocessingML surgery.
//!
//! A `.docx` file is a zip archive whose body lives in `word/document.xml`.
//! The export template carries exactly one title paragraph and one
//! metadata/body table; the compiler deep-copies those two blocks once per
//! article. This module finds the byte spans of the prototype blocks,
//! rewrites individual table cells, and repacks the archive with the new
//! body while leaving every other entry untouched.
//!
//! The template's cell layout is a load-bearing contract: field writes are
//! cell-index based, so a template with a different table shape fails with
//! [`ClipError::TemplateMalformed`].

use std::fs::File;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use crate::error::ClipError;

const DOCUMENT_ENTRY: &str = "word/document.xml";

/// Run properties applied uniformly to generated cell text: 標楷體 at
/// 14 pt (28 half-points).
const RUN_PROPS: &str = "<w:rPr>\
     <w:rFonts w:ascii=\"標楷體\" w:eastAsia=\"標楷體\" w:hAnsi=\"標楷體\"/>\
     <w:sz w:val=\"28\"/><w:szCs w:val=\"28\"/>\
     </w:rPr>";

/// A loaded `.docx` template: every archive entry plus the parsed-out
/// body XML. The template itself is never mutated; compilation writes a
/// fresh archive.
#[derive(Debug)]
pub struct DocxTemplate {
    entries: Vec<(String, Vec<u8>)>,
    document_index: usize,
    pub document_xml: String,
}

impl DocxTemplate {
    /// Open the template archive. A missing or unopenable file is
    /// [`ClipError::TemplateMissing`], fatal for the whole export.
    pub fn load(path: &Path) -> Result<Self, ClipError> {
        let file = File::open(path)
            .map_err(|e| ClipError::TemplateMissing(format!("{}: {e}", path.display())))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ClipError::TemplateMalformed(format!("{}: {e}", path.display())))?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut document_index = None;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            if name == DOCUMENT_ENTRY {
                document_index = Some(entries.len());
            }
            entries.push((name, bytes));
        }

        let document_index = document_index.ok_or_else(|| {
            ClipError::TemplateMalformed(format!("archive has no {DOCUMENT_ENTRY}"))
        })?;
        let document_xml = String::from_utf8(entries[document_index].1.clone())
            .map_err(|e| ClipError::TemplateMalformed(format!("{DOCUMENT_ENTRY}: {e}")))?;

        Ok(Self {
            entries,
            document_index,
            document_xml,
        })
    }

    /// Write a new archive at `path`, substituting `document_xml` for the
    /// template's body and copying every other entry verbatim.
    pub fn write(&self, path: &Path, document_xml: &str) -> Result<(), ClipError> {
        let file = File::create(path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (i, (name, bytes)) in self.entries.iter().enumerate() {
            writer.start_file(name.as_str(), options)?;
            if i == self.document_index {
                writer.write_all(document_xml.as_bytes())?;
            } else {
                writer.write_all(bytes)?;
            }
        }
        writer.finish()?;
        Ok(())
    }
}

/// Byte spans of the template's prototype blocks inside `document.xml`.
pub struct BodySpans {
    /// First body-level paragraph: the clip's title block.
    pub title_block: Range<usize>,
    /// First body-level table: the metadata/body table.
    pub table: Range<usize>,
    /// Where appended clones go: before the section properties, so the
    /// document stays structurally valid.
    pub insert_at: usize,
}

/// Locate the title-block paragraph, the metadata table, and the
/// insertion point inside a full `document.xml`.
pub fn body_spans(document_xml: &str) -> Result<BodySpans, ClipError> {
    let body = child_spans(document_xml, b"w:body")?
        .into_iter()
        .next()
        .ok_or_else(|| ClipError::TemplateMalformed("document has no w:body".into()))?;
    let body_xml = &document_xml[body.clone()];
    let content = root_content_range(body_xml)?;

    let title_block = child_spans(body_xml, b"w:p")?
        .into_iter()
        .next()
        .ok_or_else(|| ClipError::TemplateMalformed("template body has no paragraph".into()))?;
    let table = child_spans(body_xml, b"w:tbl")?
        .into_iter()
        .next()
        .ok_or_else(|| ClipError::TemplateMalformed("template body has no table".into()))?;
    let insert_at = child_spans(body_xml, b"w:sectPr")?
        .into_iter()
        .next()
        .map(|s| s.start)
        .unwrap_or(content.end);

    Ok(BodySpans {
        title_block: offset(&body, &title_block),
        table: offset(&body, &table),
        insert_at: body.start + insert_at,
    })
}

fn offset(base: &Range<usize>, rel: &Range<usize>) -> Range<usize> {
    (base.start + rel.start)..(base.start + rel.end)
}

/// Replace the content of cell `(row, col)` in a `<w:tbl>` fragment with
/// `paragraphs_xml`, preserving the cell's `<w:tcPr>` properties.
pub fn set_cell(
    table_xml: &str,
    row: usize,
    col: usize,
    paragraphs_xml: &str,
) -> Result<String, ClipError> {
    let rows = child_spans(table_xml, b"w:tr")?;
    let row_span = rows.get(row).ok_or_else(|| {
        ClipError::TemplateMalformed(format!("table has {} rows, need row {row}", rows.len()))
    })?;
    let row_xml = &table_xml[row_span.clone()];

    let cells = child_spans(row_xml, b"w:tc")?;
    let cell_span = cells.get(col).ok_or_else(|| {
        ClipError::TemplateMalformed(format!(
            "row {row} has {} cells, need cell {col}",
            cells.len()
        ))
    })?;
    let cell_xml = &row_xml[cell_span.clone()];

    let content = root_content_range(cell_xml)?;
    let properties_end = child_spans(cell_xml, b"w:tcPr")?
        .into_iter()
        .next()
        .map(|s| s.end)
        .unwrap_or(content.start);

    let new_cell = format!(
        "{}{}{}",
        &cell_xml[..properties_end],
        paragraphs_xml,
        &cell_xml[content.end..]
    );
    let new_row = format!(
        "{}{}{}",
        &row_xml[..cell_span.start],
        new_cell,
        &row_xml[cell_span.end..]
    );
    Ok(format!(
        "{}{}{}",
        &table_xml[..row_span.start],
        new_row,
        &table_xml[row_span.end..]
    ))
}

/// Build a `<w:p>` for cell text. Newlines become soft line breaks; the
/// run styling is uniform per cell.
pub fn paragraph_xml(text: &str, centered: bool) -> String {
    let mut runs = String::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            runs.push_str("<w:r>");
            runs.push_str(RUN_PROPS);
            runs.push_str("<w:br/></w:r>");
        }
        runs.push_str("<w:r>");
        runs.push_str(RUN_PROPS);
        runs.push_str("<w:t xml:space=\"preserve\">");
        runs.push_str(&escape(line));
        runs.push_str("</w:t></w:r>");
    }
    let alignment = if centered {
        "<w:pPr><w:jc w:val=\"center\"/></w:pPr>"
    } else {
        "<w:pPr><w:jc w:val=\"left\"/></w:pPr>"
    };
    format!("<w:p>{alignment}{runs}</w:p>")
}

/// Byte spans of the direct children named `tag` under the fragment's
/// root element. Spans cover the whole child element, tags included.
fn child_spans(fragment: &str, tag: &[u8]) -> Result<Vec<Range<usize>>, ClipError> {
    let mut reader = Reader::from_str(fragment);
    let mut spans = Vec::new();
    let mut depth = 0usize;
    loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                if depth == 1 && e.name().as_ref() == tag {
                    let end = e.to_end().into_owned();
                    reader.read_to_end(end.name())?;
                    spans.push(pos..reader.buffer_position() as usize);
                } else {
                    depth += 1;
                }
            }
            Event::Empty(e) => {
                if depth == 1 && e.name().as_ref() == tag {
                    spans.push(pos..reader.buffer_position() as usize);
                }
            }
            Event::End(_) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(spans)
}

/// Content range (between the root's open and close tags) of a fragment.
fn root_content_range(fragment: &str) -> Result<Range<usize>, ClipError> {
    let mut reader = Reader::from_str(fragment);
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let end = e.to_end().into_owned();
                let span = reader.read_to_end(end.name())?;
                return Ok(span.start as usize..span.end as usize);
            }
            Event::Empty(_) => {
                let pos = reader.buffer_position() as usize;
                return Ok(pos..pos);
            }
            Event::Eof => {
                return Err(ClipError::TemplateMalformed("fragment has no root element".into()));
            }
            _ => {}
        }
    }
}
