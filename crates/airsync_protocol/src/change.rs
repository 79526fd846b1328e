//! Change records describing a folder's evolution between sync passes.

use serde::{Deserialize, Serialize};

/// A single ordered change produced by the delta engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeRecord {
    /// The item vanished from the server.
    Delete {
        /// Item id.
        id: u64,
    },
    /// The item is new to the client.
    Add {
        /// Item id.
        id: u64,
        /// Flags for the new item (always includes the new-message bit).
        flags: u32,
    },
    /// Only the item's flags changed.
    FlagsChanged {
        /// Item id.
        id: u64,
        /// The current flag bits.
        flags: u32,
    },
    /// The item's content changed.
    Modified {
        /// Item id.
        id: u64,
    },
}

impl ChangeRecord {
    /// The id of the item this record refers to.
    pub fn id(&self) -> u64 {
        match self {
            ChangeRecord::Delete { id }
            | ChangeRecord::Add { id, .. }
            | ChangeRecord::FlagsChanged { id, .. }
            | ChangeRecord::Modified { id } => *id,
        }
    }
}

/// The kind of change a client submits for an item.
///
/// Used by conflict detection to decide whether a client-submitted
/// change collides with an intervening server change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientChangeType {
    /// Client adds a new item.
    Add,
    /// Client modifies an existing item.
    Modify,
    /// Client deletes an item.
    Delete,
}

/// The raw change triple reported by a backend for a time window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Ids added in the window.
    pub add: Vec<u64>,
    /// Ids modified in the window.
    pub modify: Vec<u64>,
    /// Ids deleted in the window.
    pub delete: Vec<u64>,
}

impl ChangeSet {
    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.modify.is_empty() && self.delete.is_empty()
    }

    /// Total number of changed ids.
    pub fn len(&self) -> usize {
        self.add.len() + self.modify.len() + self.delete.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::FLAG_NEW;

    #[test]
    fn record_id_accessor() {
        assert_eq!(ChangeRecord::Delete { id: 3 }.id(), 3);
        assert_eq!(ChangeRecord::Add { id: 4, flags: FLAG_NEW }.id(), 4);
        assert_eq!(ChangeRecord::FlagsChanged { id: 5, flags: 0 }.id(), 5);
        assert_eq!(ChangeRecord::Modified { id: 6 }.id(), 6);
    }

    #[test]
    fn change_set_emptiness() {
        let mut set = ChangeSet::default();
        assert!(set.is_empty());
        set.modify.push(9);
        assert!(!set.is_empty());
        assert_eq!(set.len(), 1);
    }
}
