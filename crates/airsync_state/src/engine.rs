//! The per-collection sync pass state machine.

use crate::backend::Backend;
use crate::delta::DeltaEngine;
use crate::error::{StateError, StateResult};
use crate::folder::FolderState;
use crate::store::{PendingPass, Snapshot, StateStore, StoredState};
use airsync_protocol::{
    ChangeRecord, ClientChangeType, Collection, ConflictDetector, ConflictPolicy, StatEntry,
    SyncKey,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// What a loaded sync pass turned out to be.
#[derive(Debug)]
pub enum PassOutcome {
    /// The client never received the previous response; these are the
    /// stored bytes to retransmit verbatim.
    Replay(Vec<u8>),
    /// A fresh pass with server-side changes to send.
    Changes(SyncPass),
}

/// Which side survives a client change that collides with a server one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Apply the client's change.
    Accept,
    /// Discard the client's change; the server version stands.
    Reject,
}

/// One in-flight sync pass for a (device, collection) pair.
///
/// Produced by [`SyncEngine::sync_pass`], consumed by
/// [`SyncEngine::commit_pass`] after the response has been sent.
/// Dropping it without committing abandons the pass; the client will
/// repeat its key and get the same changes again.
#[derive(Debug)]
pub struct SyncPass {
    device_id: String,
    collection_id: String,
    previous: Option<SyncKey>,
    sync_key: SyncKey,
    changes: Vec<ChangeRecord>,
    detector: ConflictDetector,
    policy: ConflictPolicy,
    folder: FolderState,
    stats: Vec<StatEntry>,
}

impl SyncPass {
    /// The key the response must carry.
    pub fn sync_key(&self) -> SyncKey {
        self.sync_key
    }

    /// Server-side changes to send, in ascending id order.
    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    /// Resolves a client-submitted change against intervening server
    /// changes using the pass's conflict policy.
    ///
    /// `current` is the server's present stat for the item, if it
    /// still exists.
    pub fn resolve_client_change(
        &self,
        current: Option<&StatEntry>,
        change: ClientChangeType,
    ) -> Resolution {
        let Some(current) = current else {
            // Item gone on the server. A client delete agrees with it;
            // a client modify lost the race.
            return match (change, self.policy) {
                (ClientChangeType::Delete, _) | (_, ConflictPolicy::ClientWins) => {
                    Resolution::Accept
                }
                (_, ConflictPolicy::ServerWins) => Resolution::Reject,
            };
        };

        if !self.detector.is_conflict(current, change) {
            return Resolution::Accept;
        }
        debug!(
            "conflict on item {} in {} for {}, policy {:?}",
            current.id, self.collection_id, self.device_id, self.policy
        );
        match self.policy {
            ConflictPolicy::ServerWins => Resolution::Reject,
            ConflictPolicy::ClientWins => Resolution::Accept,
        }
    }
}

/// Drives two-phase sync passes over a backend and a state store.
///
/// Both collaborators are handed in at construction. Passes for the
/// same (device, collection) pair are serialized by an internal lock
/// map; the store's compare-and-swap is the backstop for writers the
/// lock map cannot see.
pub struct SyncEngine<B: Backend, S: StateStore> {
    backend: Arc<B>,
    store: Arc<S>,
    locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl<B: Backend, S: StateStore> SyncEngine<B, S> {
    /// Creates an engine over the given backend and store.
    pub fn new(backend: B, store: S) -> Self {
        Self {
            backend: Arc::new(backend),
            store: Arc::new(store),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The backend this engine reads from.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The store this engine persists to.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn pair_lock(&self, device_id: &str, collection_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry((device_id.to_string(), collection_id.to_string()))
            .or_default()
            .clone()
    }

    /// Starts a pass for the sync key the client presented.
    ///
    /// No key mints a fresh lineage. The committed key reruns the
    /// pass, or replays the stored response when one is still pending.
    /// The pending key acknowledges the previous pass and then runs a
    /// fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::StateNotFound`] for a key that matches
    /// neither the committed nor the pending state.
    pub fn sync_pass(&self, device_id: &str, collection: &Collection) -> StateResult<PassOutcome> {
        let lock = self.pair_lock(device_id, &collection.folder_id);
        let _guard = lock.lock();

        let Some(presented) = collection.sync_key else {
            info!(
                "fresh sync lineage for device {} collection {}",
                device_id, collection.folder_id
            );
            return Ok(PassOutcome::Changes(self.fresh_pass(device_id, collection)?));
        };

        let stored = self
            .store
            .load(device_id, &collection.folder_id)?
            .ok_or_else(|| StateError::state_not_found(presented))?;

        if let Some(pending) = &stored.pending {
            if pending.snapshot.sync_key == presented {
                // The previous response arrived; promote it.
                debug!(
                    "finalizing key {} for device {} collection {}",
                    presented, device_id, collection.folder_id
                );
                let committed_key = stored.committed.sync_key;
                let finalized = StoredState {
                    committed: pending.snapshot.clone(),
                    pending: None,
                };
                self.store
                    .save(device_id, &collection.folder_id, &committed_key, finalized)?;
                let base = self
                    .store
                    .load(device_id, &collection.folder_id)?
                    .ok_or_else(|| StateError::state_not_found(presented))?;
                return Ok(PassOutcome::Changes(self.pass_from(
                    device_id, collection, base.committed,
                )?));
            }
            if stored.committed.sync_key == presented {
                // The previous response was lost in transit.
                info!(
                    "replaying pass {} for device {} collection {}",
                    pending.snapshot.sync_key, device_id, collection.folder_id
                );
                return Ok(PassOutcome::Replay(pending.response.clone()));
            }
        } else if stored.committed.sync_key == presented {
            return Ok(PassOutcome::Changes(self.pass_from(
                device_id,
                collection,
                stored.committed,
            )?));
        }

        Err(StateError::state_not_found(presented))
    }

    fn fresh_pass(&self, device_id: &str, collection: &Collection) -> StateResult<SyncPass> {
        let current = self.list_stats(collection)?;
        let mut folder = FolderState::new(&collection.folder_id);
        let ids: Vec<u64> = current.iter().map(|s| s.id).collect();
        folder.set_changes(&ids);

        Ok(SyncPass {
            device_id: device_id.to_string(),
            collection_id: collection.folder_id.clone(),
            previous: None,
            sync_key: SyncKey::initial(),
            changes: DeltaEngine::diff(&[], &current),
            detector: ConflictDetector::default(),
            policy: collection.conflict_policy,
            folder,
            stats: current,
        })
    }

    fn pass_from(
        &self,
        device_id: &str,
        collection: &Collection,
        committed: Snapshot,
    ) -> StateResult<SyncPass> {
        let current = self.list_stats(collection)?;
        let changes = DeltaEngine::diff(&committed.stats, &current);

        let mut folder = committed.folder.clone();
        let ids: Vec<u64> = current.iter().map(|s| s.id).collect();
        folder.set_changes(&ids);
        let removed: Vec<u64> = changes
            .iter()
            .filter_map(|c| match c {
                ChangeRecord::Delete { id } => Some(*id),
                _ => None,
            })
            .collect();
        folder.set_removed(&removed);

        debug!(
            "pass for device {} collection {}: {} changes from key {}",
            device_id,
            collection.folder_id,
            changes.len(),
            committed.sync_key
        );

        Ok(SyncPass {
            device_id: device_id.to_string(),
            collection_id: collection.folder_id.clone(),
            previous: Some(committed.sync_key),
            sync_key: committed.sync_key.next(),
            changes,
            detector: ConflictDetector::new(committed.stats),
            policy: collection.conflict_policy,
            folder,
            stats: current,
        })
    }

    fn list_stats(&self, collection: &Collection) -> StateResult<Vec<StatEntry>> {
        let cutoff = collection.filter.cutoff(SystemTime::now());
        Ok(self
            .backend
            .list_folder_stats(&collection.folder_id, cutoff)?)
    }

    /// Commits a pass after its response bytes have been sent.
    ///
    /// The folder buffers are folded into the baseline exactly once
    /// here. The new snapshot is stored as pending next to the still
    /// valid committed state, so the previous key keeps working until
    /// the client echoes the new one.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::CasConflict`] when a concurrent pass won
    /// the store race; the caller should rerun the pass.
    pub fn commit_pass(&self, mut pass: SyncPass, response: Vec<u8>) -> StateResult<SyncKey> {
        let lock = self.pair_lock(&pass.device_id, &pass.collection_id);
        let _guard = lock.lock();

        pass.folder.update_state();
        let snapshot = Snapshot {
            device_id: pass.device_id.clone(),
            collection_id: pass.collection_id.clone(),
            sync_key: pass.sync_key,
            folder: pass.folder,
            stats: pass.stats,
        };

        info!(
            "committing key {} for device {} collection {}",
            pass.sync_key, pass.device_id, pass.collection_id
        );

        match pass.previous {
            None => {
                // A fresh lineage has no prior key to keep valid.
                let state = StoredState {
                    committed: snapshot,
                    pending: None,
                };
                self.store
                    .reset(&pass.device_id, &pass.collection_id, state)?;
            }
            Some(previous) => {
                let stored = self
                    .store
                    .load(&pass.device_id, &pass.collection_id)?
                    .ok_or_else(|| StateError::state_not_found(previous))?;
                let state = StoredState {
                    committed: stored.committed,
                    pending: Some(PendingPass { snapshot, response }),
                };
                self.store
                    .save(&pass.device_id, &pass.collection_id, &previous, state)?;
            }
        }
        Ok(pass.sync_key)
    }

    /// Shapes the backend's reported changes for a time window into
    /// change records, without touching sync state.
    ///
    /// This is the cheap path for flows that only need "did anything
    /// change", like deciding whether a ping should wake. Email
    /// modifications surface as flag changes; other classes as plain
    /// modifications.
    pub fn windowed_changes(
        &self,
        collection: &Collection,
        from: SystemTime,
        to: SystemTime,
    ) -> StateResult<Vec<ChangeRecord>> {
        let set = self.backend.get_changes(&collection.folder_id, from, to)?;
        let stats = self.backend.list_folder_stats(&collection.folder_id, None)?;
        Ok(DeltaEngine::shape(&set, collection.class, |id| {
            stats.iter().find(|s| s.id == id).and_then(|s| s.flags)
        }))
    }

    /// Drops all state for a pair, forcing the next sync to start a
    /// fresh lineage.
    pub fn invalidate(&self, device_id: &str, collection_id: &str) -> StateResult<()> {
        let lock = self.pair_lock(device_id, collection_id);
        let _guard = lock.lock();
        info!(
            "invalidating sync state for device {} collection {}",
            device_id, collection_id
        );
        self.store.remove(device_id, collection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::store::MemoryStateStore;
    use airsync_protocol::{CollectionClass, FLAG_NEW};

    fn engine_with(stats: Vec<StatEntry>) -> SyncEngine<MockBackend, MemoryStateStore> {
        let backend = MockBackend::new();
        backend.put_folder("INBOX", stats);
        SyncEngine::new(backend, MemoryStateStore::new())
    }

    fn inbox(key: Option<SyncKey>) -> Collection {
        let collection = Collection::new(CollectionClass::Email, "INBOX");
        match key {
            Some(key) => collection.with_sync_key(key),
            None => collection,
        }
    }

    fn expect_changes(outcome: PassOutcome) -> SyncPass {
        match outcome {
            PassOutcome::Changes(pass) => pass,
            PassOutcome::Replay(_) => panic!("unexpected replay"),
        }
    }

    #[test]
    fn fresh_lineage_sends_everything_as_adds() {
        let engine = engine_with(vec![StatEntry::new(1, "a"), StatEntry::new(2, "a")]);
        let pass = expect_changes(engine.sync_pass("dev", &inbox(None)).unwrap());

        assert_eq!(pass.sync_key().counter(), 1);
        assert_eq!(
            pass.changes(),
            &[
                ChangeRecord::Add { id: 1, flags: FLAG_NEW },
                ChangeRecord::Add { id: 2, flags: FLAG_NEW },
            ]
        );
    }

    #[test]
    fn unknown_key_requires_full_resync() {
        let engine = engine_with(vec![]);
        let key = SyncKey::initial();
        let err = engine.sync_pass("dev", &inbox(Some(key))).unwrap_err();
        assert!(err.requires_full_resync());
    }

    #[test]
    fn committed_key_reruns_and_pending_key_finalizes() {
        let engine = engine_with(vec![StatEntry::new(1, "a")]);

        let pass1 = expect_changes(engine.sync_pass("dev", &inbox(None)).unwrap());
        let key1 = engine.commit_pass(pass1, b"resp1".to_vec()).unwrap();

        // New item appears server-side.
        engine
            .backend()
            .put_folder("INBOX", vec![StatEntry::new(1, "a"), StatEntry::new(2, "a")]);

        let pass2 = expect_changes(engine.sync_pass("dev", &inbox(Some(key1))).unwrap());
        assert_eq!(pass2.changes(), &[ChangeRecord::Add { id: 2, flags: FLAG_NEW }]);
        let key2 = engine.commit_pass(pass2, b"resp2".to_vec()).unwrap();
        assert_eq!(key2.counter(), key1.counter() + 1);

        // Echoing key2 acknowledges the pass; nothing new to send.
        let pass3 = expect_changes(engine.sync_pass("dev", &inbox(Some(key2))).unwrap());
        assert!(pass3.changes().is_empty());
        assert_eq!(pass3.sync_key().counter(), key2.counter() + 1);
    }

    #[test]
    fn lost_response_is_replayed_verbatim() {
        let engine = engine_with(vec![StatEntry::new(1, "a")]);

        let pass1 = expect_changes(engine.sync_pass("dev", &inbox(None)).unwrap());
        let key1 = engine.commit_pass(pass1, b"resp1".to_vec()).unwrap();

        let pass2 = expect_changes(engine.sync_pass("dev", &inbox(Some(key1))).unwrap());
        engine.commit_pass(pass2, b"resp2".to_vec()).unwrap();

        // Client repeats key1: it never saw resp2.
        match engine.sync_pass("dev", &inbox(Some(key1))).unwrap() {
            PassOutcome::Replay(bytes) => assert_eq!(bytes, b"resp2"),
            PassOutcome::Changes(_) => panic!("expected replay"),
        }
    }

    #[test]
    fn stale_commit_is_a_cas_conflict() {
        let engine = engine_with(vec![StatEntry::new(1, "a")]);

        let pass1 = expect_changes(engine.sync_pass("dev", &inbox(None)).unwrap());
        let key1 = engine.commit_pass(pass1, b"r1".to_vec()).unwrap();

        let pass_a = expect_changes(engine.sync_pass("dev", &inbox(Some(key1))).unwrap());
        let key2 = engine.commit_pass(pass_a, b"ra".to_vec()).unwrap();

        // Acknowledge key2 so the committed key moves past key1.
        let pass_b = expect_changes(engine.sync_pass("dev", &inbox(Some(key2))).unwrap());

        // A pass still anchored at key1 now loses the race.
        let stale = SyncPass {
            device_id: "dev".into(),
            collection_id: "INBOX".into(),
            previous: Some(key1),
            sync_key: key1.next(),
            changes: vec![],
            detector: ConflictDetector::default(),
            policy: ConflictPolicy::ServerWins,
            folder: FolderState::new("INBOX"),
            stats: vec![],
        };
        let err = engine.commit_pass(stale, b"stale".to_vec()).unwrap_err();
        assert!(err.is_retryable());

        // The honest pass commits fine.
        engine.commit_pass(pass_b, b"rb".to_vec()).unwrap();
    }

    #[test]
    fn deleted_items_leave_the_baseline() {
        let engine = engine_with(vec![StatEntry::new(1, "a"), StatEntry::new(2, "a")]);

        let pass1 = expect_changes(engine.sync_pass("dev", &inbox(None)).unwrap());
        let key1 = engine.commit_pass(pass1, vec![]).unwrap();

        engine.backend().put_folder("INBOX", vec![StatEntry::new(2, "a")]);
        let pass2 = expect_changes(engine.sync_pass("dev", &inbox(Some(key1))).unwrap());
        assert_eq!(pass2.changes(), &[ChangeRecord::Delete { id: 1 }]);
        let key2 = engine.commit_pass(pass2, vec![]).unwrap();

        // After the ack the item stays gone rather than re-deleting.
        let pass3 = expect_changes(engine.sync_pass("dev", &inbox(Some(key2))).unwrap());
        assert!(pass3.changes().is_empty());
    }

    #[test]
    fn conflict_policy_decides_survivor() {
        let engine = engine_with(vec![StatEntry::new(1, "v1")]);
        let pass1 = expect_changes(engine.sync_pass("dev", &inbox(None)).unwrap());
        let key1 = engine.commit_pass(pass1, vec![]).unwrap();

        // Server modifies the item before the client's edit arrives.
        engine.backend().put_folder("INBOX", vec![StatEntry::new(1, "v2")]);

        let server_wins =
            expect_changes(engine.sync_pass("dev", &inbox(Some(key1))).unwrap());
        let current = StatEntry::new(1, "v2");
        assert_eq!(
            server_wins.resolve_client_change(Some(&current), ClientChangeType::Modify),
            Resolution::Reject
        );

        let client_wins = expect_changes(
            engine
                .sync_pass(
                    "dev",
                    &inbox(Some(key1)).with_conflict_policy(ConflictPolicy::ClientWins),
                )
                .unwrap(),
        );
        assert_eq!(
            client_wins.resolve_client_change(Some(&current), ClientChangeType::Modify),
            Resolution::Accept
        );
    }

    #[test]
    fn windowed_changes_shape_per_class() {
        use airsync_protocol::ChangeSet;
        use std::time::{Duration, SystemTime};

        let engine = engine_with(vec![StatEntry::with_flags(2, "a", 4)]);
        engine.backend().put_changes(
            "INBOX",
            ChangeSet {
                add: vec![1],
                modify: vec![2],
                delete: vec![3],
            },
        );

        let to = SystemTime::now();
        let from = to - Duration::from_secs(86400);
        let records = engine.windowed_changes(&inbox(None), from, to).unwrap();
        assert_eq!(
            records,
            vec![
                ChangeRecord::Add { id: 1, flags: FLAG_NEW },
                ChangeRecord::FlagsChanged { id: 2, flags: 4 },
                ChangeRecord::Delete { id: 3 },
            ]
        );
    }

    #[test]
    fn delete_of_already_deleted_item_is_accepted() {
        let engine = engine_with(vec![StatEntry::new(1, "a")]);
        let pass = expect_changes(engine.sync_pass("dev", &inbox(None)).unwrap());
        assert_eq!(
            pass.resolve_client_change(None, ClientChangeType::Delete),
            Resolution::Accept
        );
        assert_eq!(
            pass.resolve_client_change(None, ClientChangeType::Modify),
            Resolution::Reject
        );
    }
}
