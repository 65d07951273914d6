//! Error taxonomy for the clipping pipeline.
//!
//! Per-URL extraction failures never surface through this type: the
//! extraction engine absorbs them into inline placeholder text so a batch
//! export of N URLs always produces N document blocks. `ClipError` covers
//! the remaining failure classes: user-facing rejections (duplicates,
//! bad indexes, empty queue), fatal export conditions (missing template),
//! and the transport-level errors the fetch layer reports internally.

use thiserror::Error;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum ClipError {
    /// URL matched no registered source strategy.
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// Network-level failure (DNS, TLS, connection).
    #[error("network error: {0}")]
    Network(String),

    /// A fetch or render exceeded its bounded timeout.
    #[error("timed out after {0} seconds")]
    Timeout(u64),

    /// Expected markup structure was absent.
    #[error("parse error: {0}")]
    Parse(String),

    /// Headless browser launch or page operation failed.
    #[error("browser error: {0}")]
    Browser(String),

    /// The export template could not be opened. Fatal for the whole job.
    #[error("template not found or unreadable: {0}")]
    TemplateMissing(String),

    /// The template archive was readable but structurally unusable.
    #[error("template is malformed: {0}")]
    TemplateMalformed(String),

    /// An entry with the same url or title is already queued.
    #[error("duplicate entry")]
    DuplicateEntry,

    /// A 1-based queue position outside `[1, len]`.
    #[error("index {index} out of range (queue has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Export was requested on an empty queue.
    #[error("queue is empty")]
    EmptyQueue,

    /// The submitted text contained no http(s) URL.
    #[error("no http(s) URL found in input")]
    NotAUrl,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let e = ClipError::IndexOutOfRange { index: 5, len: 2 };
        assert_eq!(e.to_string(), "index 5 out of range (queue has 2 entries)");
    }
}
