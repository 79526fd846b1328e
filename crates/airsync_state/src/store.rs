//! The persistence contract for per-collection sync state.

use crate::error::{StateError, StateResult};
use crate::folder::FolderState;
use airsync_protocol::{StatEntry, SyncKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One durable convergence point of a (device, collection) pair.
///
/// The stat list is the baseline the next pass diffs against and the
/// conflict detector checks client changes against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The device this state belongs to.
    pub device_id: String,
    /// The collection this state belongs to.
    pub collection_id: String,
    /// The sync key marking this convergence point.
    pub sync_key: SyncKey,
    /// Folder bookkeeping at this point.
    pub folder: FolderState,
    /// Item stats at this point, the diff baseline.
    pub stats: Vec<StatEntry>,
}

/// The unacknowledged half of a two-phase pass.
///
/// The snapshot becomes the committed state when the client echoes its
/// key; the response bytes are replayed verbatim if the client repeats
/// the previous key instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPass {
    /// The state the pass produced, not yet acknowledged.
    pub snapshot: Snapshot,
    /// The encoded response sent for that pass.
    pub response: Vec<u8>,
}

/// What the store holds for one (device, collection) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    /// The last client-acknowledged snapshot.
    pub committed: Snapshot,
    /// A produced-but-unacknowledged pass, if any.
    pub pending: Option<PendingPass>,
}

/// Durable storage for sync state.
///
/// `save` is compare-and-swap on the committed sync key: writers race
/// per (device, collection), and the loser gets
/// [`StateError::CasConflict`] instead of silently clobbering the
/// winner. `reset` bypasses the check for fresh-lineage starts, where
/// whatever was stored is abandoned by definition.
pub trait StateStore: Send + Sync {
    /// Loads the state for a pair, or `None` if the device has never
    /// synced the collection.
    fn load(&self, device_id: &str, collection_id: &str) -> StateResult<Option<StoredState>>;

    /// Stores `state`, provided the currently stored committed key
    /// still equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::CasConflict`] when the stored key no
    /// longer matches, or when `expected` is given but no state exists.
    fn save(
        &self,
        device_id: &str,
        collection_id: &str,
        expected: &SyncKey,
        state: StoredState,
    ) -> StateResult<()>;

    /// Stores `state` unconditionally, discarding any previous lineage.
    fn reset(&self, device_id: &str, collection_id: &str, state: StoredState) -> StateResult<()>;

    /// Removes all state for a pair.
    fn remove(&self, device_id: &str, collection_id: &str) -> StateResult<()>;
}

/// In-memory [`StateStore`] backed by encoded snapshots.
///
/// States are held as serialized bytes rather than live structs so the
/// store exercises the same encode/decode path a durable backend
/// would, and so loads hand out genuinely independent copies.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn encode(state: &StoredState) -> StateResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(state, &mut bytes)
            .map_err(|e| StateError::Snapshot(e.to_string()))?;
        Ok(bytes)
    }

    fn decode(bytes: &[u8]) -> StateResult<StoredState> {
        ciborium::from_reader(bytes).map_err(|e: ciborium::de::Error<std::io::Error>| {
            StateError::Snapshot(e.to_string())
        })
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, device_id: &str, collection_id: &str) -> StateResult<Option<StoredState>> {
        let states = self.states.read();
        states
            .get(&(device_id.to_string(), collection_id.to_string()))
            .map(|bytes| Self::decode(bytes))
            .transpose()
    }

    fn save(
        &self,
        device_id: &str,
        collection_id: &str,
        expected: &SyncKey,
        state: StoredState,
    ) -> StateResult<()> {
        let bytes = Self::encode(&state)?;
        let key = (device_id.to_string(), collection_id.to_string());
        let mut states = self.states.write();

        let conflict = || StateError::CasConflict {
            device_id: device_id.to_string(),
            collection_id: collection_id.to_string(),
        };

        let current = states.get(&key).ok_or_else(|| conflict())?;
        if Self::decode(current)?.committed.sync_key != *expected {
            return Err(conflict());
        }
        states.insert(key, bytes);
        Ok(())
    }

    fn reset(&self, device_id: &str, collection_id: &str, state: StoredState) -> StateResult<()> {
        let bytes = Self::encode(&state)?;
        let mut states = self.states.write();
        states.insert((device_id.to_string(), collection_id.to_string()), bytes);
        Ok(())
    }

    fn remove(&self, device_id: &str, collection_id: &str) -> StateResult<()> {
        let mut states = self.states.write();
        states.remove(&(device_id.to_string(), collection_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(key: SyncKey) -> Snapshot {
        Snapshot {
            device_id: "dev1".into(),
            collection_id: "INBOX".into(),
            sync_key: key,
            folder: FolderState::new("INBOX"),
            stats: vec![StatEntry::new(1, "100")],
        }
    }

    fn stored(key: SyncKey) -> StoredState {
        StoredState {
            committed: snapshot(key),
            pending: None,
        }
    }

    #[test]
    fn load_round_trips_through_encoding() {
        let store = MemoryStateStore::new();
        let key = SyncKey::initial();
        store.reset("dev1", "INBOX", stored(key)).unwrap();

        let loaded = store.load("dev1", "INBOX").unwrap().unwrap();
        assert_eq!(loaded.committed.sync_key, key);
        assert_eq!(loaded.committed.stats, vec![StatEntry::new(1, "100")]);
    }

    #[test]
    fn load_unknown_pair_is_none() {
        let store = MemoryStateStore::new();
        assert!(store.load("dev1", "INBOX").unwrap().is_none());
    }

    #[test]
    fn save_requires_matching_key() {
        let store = MemoryStateStore::new();
        let key = SyncKey::initial();
        store.reset("dev1", "INBOX", stored(key)).unwrap();

        // Matching expected key succeeds.
        store.save("dev1", "INBOX", &key, stored(key.next())).unwrap();

        // The old key no longer matches.
        let err = store
            .save("dev1", "INBOX", &key, stored(key.next().next()))
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn save_against_absent_state_conflicts() {
        let store = MemoryStateStore::new();
        let key = SyncKey::initial();
        let err = store.save("dev1", "INBOX", &key, stored(key)).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn reset_overwrites_any_lineage() {
        let store = MemoryStateStore::new();
        store.reset("dev1", "INBOX", stored(SyncKey::initial())).unwrap();

        let fresh = SyncKey::initial();
        store.reset("dev1", "INBOX", stored(fresh)).unwrap();
        let loaded = store.load("dev1", "INBOX").unwrap().unwrap();
        assert_eq!(loaded.committed.sync_key, fresh);
    }

    #[test]
    fn remove_clears_state() {
        let store = MemoryStateStore::new();
        store.reset("dev1", "INBOX", stored(SyncKey::initial())).unwrap();
        store.remove("dev1", "INBOX").unwrap();
        assert!(store.load("dev1", "INBOX").unwrap().is_none());
    }
}
