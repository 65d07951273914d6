//! Per-session curation queue of selected articles.
//!
//! A [`CurationQueue`] is an ordered, deduplicated list of
//! [`ArticleReference`]s scoped to one session. Order is insertion order.
//! External positions are 1-based; internally everything is 0-based.
//! Invariant: no two entries share a url or share a title (the loose
//! dedup policy, where either match counts).
//!
//! Queues live only for the session's lifetime inside a [`SessionStore`];
//! nothing is persisted. Mutations are not designed for concurrent
//! writers; the store serializes access per call.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::ClipError;
use crate::models::{ArticleReference, ListedEntry};

/// Ordered, deduplicated list of article references for one session.
#[derive(Debug, Default)]
pub struct CurationQueue {
    entries: Vec<ArticleReference>,
}

impl CurationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reference unless it collides with an existing entry on
    /// url or title. Returns the new length, or [`ClipError::DuplicateEntry`]
    /// without mutating the queue.
    pub fn append(&mut self, reference: ArticleReference) -> Result<usize, ClipError> {
        if self.entries.iter().any(|e| e.collides_with(&reference)) {
            return Err(ClipError::DuplicateEntry);
        }
        self.entries.push(reference);
        Ok(self.entries.len())
    }

    /// Remove and return the entry at a 1-based position.
    pub fn remove(&mut self, position: usize) -> Result<ArticleReference, ClipError> {
        let index = self.checked_index(position)?;
        Ok(self.entries.remove(index))
    }

    /// Move the entry at `from` to position `to` (both 1-based); the
    /// remaining entries shift to fill the gap.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<(), ClipError> {
        let from_idx = self.checked_index(from)?;
        let to_idx = self.checked_index(to)?;
        let entry = self.entries.remove(from_idx);
        self.entries.insert(to_idx, entry);
        Ok(())
    }

    /// Entries in stored order. The iterator is lazy, finite, and can be
    /// restarted by calling `list` again.
    pub fn list(&self) -> impl Iterator<Item = &ArticleReference> {
        self.entries.iter()
    }

    /// The user-visible listing: 1-based positions with title and url.
    pub fn listed(&self) -> Vec<ListedEntry> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| ListedEntry {
                position: i + 1,
                title: e.title.clone(),
                url: e.url.clone(),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Urls in stored order, for export.
    pub fn urls(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.url.clone()).collect()
    }

    fn checked_index(&self, position: usize) -> Result<usize, ClipError> {
        if position == 0 || position > self.entries.len() {
            return Err(ClipError::IndexOutOfRange {
                index: position,
                len: self.entries.len(),
            });
        }
        Ok(position - 1)
    }
}

/// Session-keyed queue storage. One lock serializes all queue mutations,
/// matching the single-writer-per-session contract.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, CurationQueue>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the session's queue, creating the queue empty on
    /// first use.
    pub async fn with_queue<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut CurationQueue) -> T,
    ) -> T {
        let mut sessions = self.sessions.lock().await;
        let queue = sessions.entry(session_id.to_string()).or_default();
        f(queue)
    }
}
