//! Per-folder change-set bookkeeping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Tracks one folder's committed item baseline and the transient
/// added/changed/removed buffers of the current sync pass.
///
/// `known_ids` is the committed baseline; the three buffers exist only
/// between [`set_changes`](FolderState::set_changes)/
/// [`set_removed`](FolderState::set_removed) and the
/// [`update_state`](FolderState::update_state) commit, which must run
/// exactly once per pass and only after the response has been durably
/// sent. The buffers are deliberately not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderState {
    server_id: String,
    uid_validity: u64,
    uid_next: u64,
    mod_seq: u64,
    known_ids: BTreeSet<u64>,
    #[serde(skip)]
    added: BTreeSet<u64>,
    #[serde(skip)]
    changed: BTreeSet<u64>,
    #[serde(skip)]
    removed: BTreeSet<u64>,
}

impl FolderState {
    /// Creates state for a folder on its first sync.
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            uid_validity: 0,
            uid_next: 0,
            mod_seq: 0,
            known_ids: BTreeSet::new(),
            added: BTreeSet::new(),
            changed: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    /// The server id of this folder.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// The folder's UID validity marker.
    pub fn uid_validity(&self) -> u64 {
        self.uid_validity
    }

    /// The folder's next-UID value.
    pub fn uid_next(&self) -> u64 {
        self.uid_next
    }

    /// The folder's highest modification sequence.
    pub fn mod_seq(&self) -> u64 {
        self.mod_seq
    }

    /// Updates the folder status values.
    pub fn set_status(&mut self, uid_validity: u64, uid_next: u64, mod_seq: u64) {
        self.uid_validity = uid_validity;
        self.uid_next = uid_next;
        self.mod_seq = mod_seq;
    }

    /// Populates the transient buffers from the folder's current ids.
    ///
    /// `added` becomes every current id not in the baseline; `changed`
    /// becomes every current id that is. The changed set is an
    /// intentional over-approximation — whether an item actually
    /// changed is resolved later by comparing stat tokens, not by this
    /// set alone.
    pub fn set_changes(&mut self, current_ids: &[u64]) {
        self.added = current_ids
            .iter()
            .copied()
            .filter(|id| !self.known_ids.contains(id))
            .collect();
        self.changed = current_ids
            .iter()
            .copied()
            .filter(|id| !self.added.contains(id))
            .collect();
    }

    /// Records the ids the backend reports as deleted.
    ///
    /// The set is caller-supplied, never derived by subtraction — the
    /// backend knows authoritatively what vanished.
    pub fn set_removed(&mut self, ids: &[u64]) {
        self.removed = ids.iter().copied().collect();
    }

    /// Commits the transient buffers into the baseline and clears them.
    ///
    /// `known = (known − removed) ∪ added`. Calling this with empty
    /// buffers is a no-op.
    pub fn update_state(&mut self) {
        for id in &self.removed {
            self.known_ids.remove(id);
        }
        self.known_ids.extend(self.added.iter().copied());
        self.added.clear();
        self.changed.clear();
        self.removed.clear();
    }

    /// The committed baseline ids.
    pub fn known_ids(&self) -> &BTreeSet<u64> {
        &self.known_ids
    }

    /// Ids added in the current pass.
    pub fn added(&self) -> &BTreeSet<u64> {
        &self.added
    }

    /// Ids possibly changed in the current pass.
    pub fn changed(&self) -> &BTreeSet<u64> {
        &self.changed
    }

    /// Ids removed in the current pass.
    pub fn removed(&self) -> &BTreeSet<u64> {
        &self.removed
    }
}

impl fmt::Display for FolderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: uidvalidity {} uidnext {} modseq {} known {} added {} changed {} removed {}",
            self.server_id,
            self.uid_validity,
            self.uid_next,
            self.mod_seq,
            self.known_ids.len(),
            self.added.len(),
            self.changed.len(),
            self.removed.len()
        )
    }
}
