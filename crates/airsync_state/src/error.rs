//! Error types for the sync state machine.

use crate::backend::BackendError;
use airsync_protocol::SyncKeyError;
use thiserror::Error;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during a sync pass.
#[derive(Error, Debug)]
pub enum StateError {
    /// The client presented a malformed sync key. The client must
    /// restart from the empty key.
    #[error(transparent)]
    SyncKey(#[from] SyncKeyError),

    /// No state exists for the presented key. The client must run a
    /// full resync.
    #[error("no sync state for key {sync_key}")]
    StateNotFound {
        /// The key the client presented.
        sync_key: String,
    },

    /// A concurrent pass updated the state first. The caller should
    /// reload and retry.
    #[error("concurrent state update for device {device_id}, collection {collection_id}")]
    CasConflict {
        /// Device whose state was contended.
        device_id: String,
        /// Collection whose state was contended.
        collection_id: String,
    },

    /// The backend collaborator failed. Where the protocol defines a
    /// per-item status this degrades only the item; otherwise it
    /// propagates so sibling collections still succeed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Snapshot serialization failed.
    #[error("snapshot encoding failed: {0}")]
    Snapshot(String),
}

impl StateError {
    /// Creates a `StateNotFound` error.
    pub fn state_not_found(sync_key: impl ToString) -> Self {
        Self::StateNotFound {
            sync_key: sync_key.to_string(),
        }
    }

    /// Returns true if the client must restart the lineage with a full
    /// resync.
    pub fn requires_full_resync(&self) -> bool {
        matches!(self, StateError::StateNotFound { .. })
    }

    /// Returns true if the same request can be retried after reloading
    /// state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StateError::CasConflict { .. })
    }
}
