//! The two-list diff at the heart of the sync protocol.

use airsync_protocol::{ChangeRecord, ChangeSet, CollectionClass, StatEntry, FLAG_NEW};
use std::cmp::Ordering;

/// Computes ordered change records between two stat snapshots.
///
/// The exactness contract: every id present in exactly one of the two
/// lists produces exactly one record; an id present in both produces
/// zero, one or two records (flags check first, then mod check); no id
/// is ever dropped or duplicated. The whole protocol depends on this —
/// a dropped or doubled record silently diverges client and server
/// forever.
pub struct DeltaEngine;

impl DeltaEngine {
    /// Diffs the client's last-acknowledged state (`old`) against the
    /// backend's current state (`new`).
    ///
    /// Both lists are sorted ascending by id and merge-walked in
    /// O(n log n):
    /// - id in both: differing flags (when both carry flags) emit
    ///   [`ChangeRecord::FlagsChanged`]; independently, differing mod
    ///   tokens emit [`ChangeRecord::Modified`].
    /// - id only in `old`: the item vanished, [`ChangeRecord::Delete`].
    /// - id only in `new`: the item is new, [`ChangeRecord::Add`] with
    ///   the new-message flag.
    pub fn diff(old: &[StatEntry], new: &[StatEntry]) -> Vec<ChangeRecord> {
        let mut old: Vec<&StatEntry> = old.iter().collect();
        let mut new: Vec<&StatEntry> = new.iter().collect();
        old.sort_unstable_by_key(|s| s.id);
        new.sort_unstable_by_key(|s| s.id);

        let mut changes = Vec::new();
        let mut iold = 0;
        let mut inew = 0;

        while iold < old.len() && inew < new.len() {
            let o = old[iold];
            let n = new[inew];
            match o.id.cmp(&n.id) {
                Ordering::Equal => {
                    if let (Some(of), Some(nf)) = (o.flags, n.flags) {
                        if of != nf {
                            changes.push(ChangeRecord::FlagsChanged { id: n.id, flags: nf });
                        }
                    }
                    if o.mod_token != n.mod_token {
                        changes.push(ChangeRecord::Modified { id: n.id });
                    }
                    iold += 1;
                    inew += 1;
                }
                Ordering::Less => {
                    // Present in the old state only: deleted on the server.
                    changes.push(ChangeRecord::Delete { id: o.id });
                    iold += 1;
                }
                Ordering::Greater => {
                    changes.push(ChangeRecord::Add {
                        id: n.id,
                        flags: FLAG_NEW,
                    });
                    inew += 1;
                }
            }
        }

        while iold < old.len() {
            changes.push(ChangeRecord::Delete { id: old[iold].id });
            iold += 1;
        }

        while inew < new.len() {
            changes.push(ChangeRecord::Add {
                id: new[inew].id,
                flags: FLAG_NEW,
            });
            inew += 1;
        }

        changes
    }

    /// Shapes a backend's windowed change triple into change records.
    ///
    /// Additions carry the new-message flag. For email collections a
    /// modification is a flag change, looked up through `flags_of`;
    /// other classes report plain modifications.
    pub fn shape(
        set: &ChangeSet,
        class: CollectionClass,
        flags_of: impl Fn(u64) -> Option<u32>,
    ) -> Vec<ChangeRecord> {
        let mut records = Vec::with_capacity(set.len());

        for &id in &set.add {
            records.push(ChangeRecord::Add {
                id,
                flags: FLAG_NEW,
            });
        }

        for &id in &set.modify {
            if class == CollectionClass::Email {
                records.push(ChangeRecord::FlagsChanged {
                    id,
                    flags: flags_of(id).unwrap_or(0),
                });
            } else {
                records.push(ChangeRecord::Modified { id });
            }
        }

        for &id in &set.delete {
            records.push(ChangeRecord::Delete { id });
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn modified_item() {
        // old=[{id:5,mod:1,flags:0}], new=[{id:5,mod:2,flags:0}]
        let old = vec![StatEntry::with_flags(5, "1", 0)];
        let new = vec![StatEntry::with_flags(5, "2", 0)];
        assert_eq!(
            DeltaEngine::diff(&old, &new),
            vec![ChangeRecord::Modified { id: 5 }]
        );
    }

    #[test]
    fn deleted_item() {
        let old = vec![StatEntry::new(5, "1")];
        assert_eq!(
            DeltaEngine::diff(&old, &[]),
            vec![ChangeRecord::Delete { id: 5 }]
        );
    }

    #[test]
    fn added_item() {
        let new = vec![StatEntry::new(7, "1")];
        assert_eq!(
            DeltaEngine::diff(&[], &new),
            vec![ChangeRecord::Add { id: 7, flags: FLAG_NEW }]
        );
    }

    #[test]
    fn flags_then_mod_for_same_id() {
        let old = vec![StatEntry::with_flags(5, "1", 0)];
        let new = vec![StatEntry::with_flags(5, "2", 1)];
        assert_eq!(
            DeltaEngine::diff(&old, &new),
            vec![
                ChangeRecord::FlagsChanged { id: 5, flags: 1 },
                ChangeRecord::Modified { id: 5 },
            ]
        );
    }

    #[test]
    fn flags_ignored_when_either_side_has_none() {
        let old = vec![StatEntry::new(5, "1")];
        let new = vec![StatEntry::with_flags(5, "1", 1)];
        assert!(DeltaEngine::diff(&old, &new).is_empty());
    }

    #[test]
    fn unsorted_input_is_handled() {
        let old = vec![StatEntry::new(9, "1"), StatEntry::new(2, "1")];
        let new = vec![StatEntry::new(2, "1"), StatEntry::new(4, "1")];
        let changes = DeltaEngine::diff(&old, &new);
        assert_eq!(
            changes,
            vec![
                ChangeRecord::Add { id: 4, flags: FLAG_NEW },
                ChangeRecord::Delete { id: 9 },
            ]
        );
    }

    #[test]
    fn interleaved_adds_and_deletes() {
        let old = vec![
            StatEntry::new(1, "a"),
            StatEntry::new(3, "a"),
            StatEntry::new(5, "a"),
        ];
        let new = vec![
            StatEntry::new(2, "a"),
            StatEntry::new(3, "a"),
            StatEntry::new(6, "a"),
        ];
        let changes = DeltaEngine::diff(&old, &new);
        assert_eq!(
            changes,
            vec![
                ChangeRecord::Delete { id: 1 },
                ChangeRecord::Add { id: 2, flags: FLAG_NEW },
                ChangeRecord::Delete { id: 5 },
                ChangeRecord::Add { id: 6, flags: FLAG_NEW },
            ]
        );
    }

    #[test]
    fn shape_email_modifications_become_flag_changes() {
        let set = ChangeSet {
            add: vec![10],
            modify: vec![11],
            delete: vec![12],
        };
        let records = DeltaEngine::shape(&set, CollectionClass::Email, |id| {
            (id == 11).then_some(4)
        });
        assert_eq!(
            records,
            vec![
                ChangeRecord::Add { id: 10, flags: FLAG_NEW },
                ChangeRecord::FlagsChanged { id: 11, flags: 4 },
                ChangeRecord::Delete { id: 12 },
            ]
        );
    }

    #[test]
    fn shape_non_email_modifications_stay_plain() {
        let set = ChangeSet {
            add: vec![],
            modify: vec![20],
            delete: vec![],
        };
        let records = DeltaEngine::shape(&set, CollectionClass::Calendar, |_| None);
        assert_eq!(records, vec![ChangeRecord::Modified { id: 20 }]);
    }

    fn stat_list(max_id: u64) -> impl Strategy<Value = Vec<StatEntry>> {
        proptest::collection::btree_set(0..max_id, 0..24).prop_flat_map(|ids| {
            let ids: Vec<u64> = ids.into_iter().collect();
            let len = ids.len();
            (
                Just(ids),
                proptest::collection::vec(0u8..4, len),
                proptest::collection::vec(proptest::option::of(0u32..4), len),
            )
                .prop_map(|(ids, mods, flags)| {
                    ids.into_iter()
                        .zip(mods)
                        .zip(flags)
                        .map(|((id, m), f)| StatEntry {
                            id,
                            mod_token: m.to_string(),
                            flags: f,
                        })
                        .collect()
                })
        })
    }

    proptest! {
        #[test]
        fn every_one_sided_id_yields_exactly_one_record(
            old in stat_list(32),
            new in stat_list(32),
        ) {
            let changes = DeltaEngine::diff(&old, &new);

            let old_ids: HashSet<u64> = old.iter().map(|s| s.id).collect();
            let new_ids: HashSet<u64> = new.iter().map(|s| s.id).collect();

            for id in old_ids.symmetric_difference(&new_ids) {
                let count = changes.iter().filter(|c| c.id() == *id).count();
                prop_assert_eq!(count, 1, "id {} produced {} records", id, count);
            }
            for id in old_ids.intersection(&new_ids) {
                let count = changes.iter().filter(|c| c.id() == *id).count();
                prop_assert!(count <= 2, "id {} produced {} records", id, count);
            }
        }

        #[test]
        fn change_count_is_bounded(old in stat_list(32), new in stat_list(32)) {
            let changes = DeltaEngine::diff(&old, &new);
            prop_assert!(changes.len() <= old.len() + new.len());
        }
    }
}
