//! Session-facing operations: submit a URL, list, reorder, remove,
//! clear, and export the queue as a compiled document.
//!
//! This is the layer a front end (CLI today, a chat transport later)
//! calls into. Everything here works in terms of session ids and
//! 1-based positions; the heavy lifting lives in [`crate::extract`] and
//! [`crate::compile`].

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, instrument, warn};

use crate::compile;
use crate::error::ClipError;
use crate::extract::Engine;
use crate::models::{ArticleReference, ListedEntry};
use crate::queue::SessionStore;
use crate::utils::extract_first_url;

/// Reply shown when a submission contains no http(s) URL.
pub const NOT_A_URL_REPLY: &str = "請傳送新聞網址（需包含 http:// 或 https://）。";

/// What happened to one submitted message.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The article was extracted and queued; `count` is the new queue length.
    Added { title: String, count: usize },
    /// The queue already holds this url or this title.
    Duplicate { title: String },
    /// The message carried no URL at all.
    Rejected { reason: String },
}

pub struct ClipService {
    engine: Engine,
    store: SessionStore,
    template_path: PathBuf,
    output_dir: PathBuf,
}

impl ClipService {
    pub fn new(engine: Engine, template_path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            engine,
            store: SessionStore::new(),
            template_path,
            output_dir,
        }
    }

    /// Handle one submitted message: find the first URL in it, extract
    /// the article, and append it to the session's queue.
    ///
    /// Extraction failure is not rejection: the failure placeholder is
    /// queued under the URL so the user can still see and remove it.
    #[instrument(level = "info", skip(self, text), fields(session = session_id))]
    pub async fn submit_url(&self, session_id: &str, text: &str) -> SubmitOutcome {
        let Some(url) = extract_first_url(text) else {
            return SubmitOutcome::Rejected {
                reason: NOT_A_URL_REPLY.to_string(),
            };
        };
        let url = url.to_string();

        let result = self.engine.extract(&url, None).await;
        let reference = ArticleReference {
            url,
            title: result.title.clone(),
        };
        let title = reference.title.clone();

        let appended = self
            .store
            .with_queue(session_id, |queue| queue.append(reference))
            .await;
        match appended {
            Ok(count) => {
                info!(title = %title, count, "article queued");
                SubmitOutcome::Added { title, count }
            }
            Err(ClipError::DuplicateEntry) => {
                info!(title = %title, "duplicate submission ignored");
                SubmitOutcome::Duplicate { title }
            }
            Err(e) => {
                warn!(error = %e, "queue append failed");
                SubmitOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Compile the session's queue into a document and, on success,
    /// clear the queue. The queue survives every failure so nothing the
    /// user collected is lost. When `output` is `None` the document gets
    /// a timestamped name inside the configured output directory.
    #[instrument(level = "info", skip(self, output), fields(session = session_id))]
    pub async fn export(
        &self,
        session_id: &str,
        output: Option<&Path>,
    ) -> Result<PathBuf, ClipError> {
        let urls = self
            .store
            .with_queue(session_id, |queue| queue.urls())
            .await;
        if urls.is_empty() {
            return Err(ClipError::EmptyQueue);
        }

        let output_path = match output {
            Some(path) => path.to_path_buf(),
            None => {
                let filename =
                    format!("新聞剪報_{}.docx", Local::now().format("%Y%m%d_%H%M%S"));
                self.output_dir.join(filename)
            }
        };
        let written = compile::compile(&self.engine, &urls, &self.template_path, &output_path).await?;

        self.store
            .with_queue(session_id, |queue| queue.clear())
            .await;
        info!(path = %written.display(), "export finished, queue cleared");
        Ok(written)
    }

    pub async fn list(&self, session_id: &str) -> Vec<ListedEntry> {
        self.store
            .with_queue(session_id, |queue| queue.listed())
            .await
    }

    /// Remove the entry at 1-based `position`, returning it.
    pub async fn remove(
        &self,
        session_id: &str,
        position: usize,
    ) -> Result<ArticleReference, ClipError> {
        self.store
            .with_queue(session_id, |queue| queue.remove(position))
            .await
    }

    /// Move the entry at 1-based `from` to 1-based `to`.
    pub async fn move_entry(
        &self,
        session_id: &str,
        from: usize,
        to: usize,
    ) -> Result<(), ClipError> {
        self.store
            .with_queue(session_id, |queue| queue.move_entry(from, to))
            .await
    }

    pub async fn clear(&self, session_id: &str) -> usize {
        self.store
            .with_queue(session_id, |queue| {
                let dropped = queue.len();
                queue.clear();
                dropped
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ClipService {
        ClipService::new(
            Engine::with_defaults().unwrap(),
            PathBuf::from("/nonexistent/範本.docx"),
            std::env::temp_dir(),
        )
    }

    #[tokio::test]
    async fn test_submission_without_url_is_rejected() {
        let svc = service();
        match svc.submit_url("s1", "幫我匯出今天的新聞").await {
            SubmitOutcome::Rejected { reason } => assert_eq!(reason, NOT_A_URL_REPLY),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_export_of_empty_session_fails_cleanly() {
        let svc = service();
        assert!(matches!(
            svc.export("s1", None).await,
            Err(ClipError::EmptyQueue)
        ));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let svc = service();
        // An unsupported host resolves without any network round trip.
        svc.submit_url("s1", "看看這篇 https://unknown.example.org/a")
            .await;
        assert_eq!(svc.list("s1").await.len(), 1);
        assert!(svc.list("s2").await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_out_of_range_reports_position() {
        let svc = service();
        let err = svc.remove("s1", 3).await.unwrap_err();
        assert!(matches!(
            err,
            ClipError::IndexOutOfRange { index: 3, len: 0 }
        ));
    }
}
