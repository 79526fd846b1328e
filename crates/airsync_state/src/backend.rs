//! The backend collaborator contract and its in-memory test double.

use airsync_protocol::{ChangeSet, StatEntry};
use std::time::SystemTime;
use thiserror::Error;

/// Errors a backend can report.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The requested folder or item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Creates a `NotFound` error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates an `Other` error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Returns true for missing-target failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// The mailstore the sync engine reads from.
///
/// Implementations are handed to the engine explicitly at construction.
/// Backends report only facts about the store; all diffing and state
/// bookkeeping stays on the engine side.
pub trait Backend: Send + Sync {
    /// Stats every item currently in the folder, honoring the filter
    /// cutoff when one is given. Items older than the cutoff are
    /// omitted entirely.
    fn list_folder_stats(
        &self,
        folder_id: &str,
        cutoff: Option<SystemTime>,
    ) -> BackendResult<Vec<StatEntry>>;

    /// Reports the add/modify/delete triple for a folder within the
    /// given time window.
    fn get_changes(
        &self,
        folder_id: &str,
        from: SystemTime,
        to: SystemTime,
    ) -> BackendResult<ChangeSet>;

    /// Resolves a request item inside a folder to the id of the
    /// resulting entry, e.g. a meeting invitation to the calendar entry
    /// created by accepting it.
    fn resolve_request_target(&self, folder_id: &str, request_id: &str) -> BackendResult<String>;
}

/// An in-memory backend for tests.
///
/// Folders are keyed by id and hold a stat list plus a table of
/// resolvable request ids.
#[derive(Debug, Default)]
pub struct MockBackend {
    folders: parking_lot::RwLock<std::collections::HashMap<String, MockFolder>>,
}

#[derive(Debug, Default)]
struct MockFolder {
    stats: Vec<StatEntry>,
    changes: ChangeSet,
    requests: std::collections::HashMap<String, String>,
}

impl MockBackend {
    /// Creates an empty mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a folder with the given stat list.
    pub fn put_folder(&self, folder_id: impl Into<String>, stats: Vec<StatEntry>) {
        let mut folders = self.folders.write();
        folders.entry(folder_id.into()).or_default().stats = stats;
    }

    /// Sets the change triple a folder reports for any window.
    pub fn put_changes(&self, folder_id: impl Into<String>, changes: ChangeSet) {
        let mut folders = self.folders.write();
        folders.entry(folder_id.into()).or_default().changes = changes;
    }

    /// Registers a resolvable request id inside a folder.
    pub fn put_request(
        &self,
        folder_id: impl Into<String>,
        request_id: impl Into<String>,
        target: impl Into<String>,
    ) {
        let mut folders = self.folders.write();
        folders
            .entry(folder_id.into())
            .or_default()
            .requests
            .insert(request_id.into(), target.into());
    }
}

impl Backend for MockBackend {
    fn list_folder_stats(
        &self,
        folder_id: &str,
        _cutoff: Option<SystemTime>,
    ) -> BackendResult<Vec<StatEntry>> {
        let folders = self.folders.read();
        folders
            .get(folder_id)
            .map(|f| f.stats.clone())
            .ok_or_else(|| BackendError::not_found(folder_id))
    }

    fn get_changes(
        &self,
        folder_id: &str,
        _from: SystemTime,
        _to: SystemTime,
    ) -> BackendResult<ChangeSet> {
        let folders = self.folders.read();
        folders
            .get(folder_id)
            .map(|f| f.changes.clone())
            .ok_or_else(|| BackendError::not_found(folder_id))
    }

    fn resolve_request_target(&self, folder_id: &str, request_id: &str) -> BackendResult<String> {
        let folders = self.folders.read();
        // A bad folder is a store-level failure; only a missing item
        // within a live folder is NotFound.
        let folder = folders
            .get(folder_id)
            .ok_or_else(|| BackendError::other(format!("no folder {folder_id}")))?;
        folder
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(request_id))
    }
}
