//! Conflict detection between client and server changes.

use crate::change::ClientChangeType;
use crate::stat::StatEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Policy for resolving a detected conflict.
///
/// The detector never resolves; whoever drives the sync pass consumes
/// this policy to decide which side's change survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// The server's version survives; the client change is discarded.
    #[default]
    ServerWins,
    /// The client's version survives; the server change is overwritten.
    ClientWins,
}

impl ConflictPolicy {
    /// Encodes to the wire code.
    pub fn to_code(&self) -> u8 {
        match self {
            ConflictPolicy::ServerWins => 0,
            ConflictPolicy::ClientWins => 1,
        }
    }

    /// Decodes the wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ConflictPolicy::ServerWins),
            1 => Some(ConflictPolicy::ClientWins),
            _ => None,
        }
    }
}

/// Detects collisions between a client-submitted change and an
/// intervening server change.
///
/// The detector holds the stats recorded when the client last saw the
/// items (the loaded sync state). A conflict exists when the server's
/// current stat for an item no longer matches that baseline while the
/// client is also trying to change the item.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    baseline: HashMap<u64, StatEntry>,
}

impl ConflictDetector {
    /// Creates a detector over the client's last-acknowledged stats.
    pub fn new(baseline: impl IntoIterator<Item = StatEntry>) -> Self {
        Self {
            baseline: baseline.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    /// Returns true if the server has independently changed the item
    /// the client change targets.
    ///
    /// Client additions never conflict. For modifications and deletions
    /// the current server stat is compared against the baseline; an
    /// item missing from the baseline has nothing to collide with.
    pub fn is_conflict(&self, current: &StatEntry, change: ClientChangeType) -> bool {
        match change {
            ClientChangeType::Add => false,
            ClientChangeType::Modify | ClientChangeType::Delete => {
                match self.baseline.get(&current.id) {
                    Some(known) => {
                        known.mod_token != current.mod_token || known.flags != current.flags
                    }
                    None => false,
                }
            }
        }
    }

    /// Number of items in the baseline.
    pub fn len(&self) -> usize {
        self.baseline.len()
    }

    /// Returns true if the baseline is empty.
    pub fn is_empty(&self) -> bool {
        self.baseline.is_empty()
    }
}
