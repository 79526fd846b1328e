//! Lightweight item summaries used for change comparison.

use serde::{Deserialize, Serialize};

/// Flag bit marking an item the client has never seen.
pub const FLAG_NEW: u32 = 1;

/// A minimal summary of a mailbox/PIM item.
///
/// Stats are what the delta engine compares; the full item is never
/// loaded for diffing. `mod_token` is an opaque modification marker
/// (a timestamp, a modseq, a hash — the backend decides); two stats
/// with different tokens represent different item revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    /// Item id, unique within its folder.
    pub id: u64,
    /// Opaque modification token.
    pub mod_token: String,
    /// Message flags, if the item class carries them.
    pub flags: Option<u32>,
}

impl StatEntry {
    /// Creates a stat without flags.
    pub fn new(id: u64, mod_token: impl Into<String>) -> Self {
        Self {
            id,
            mod_token: mod_token.into(),
            flags: None,
        }
    }

    /// Creates a stat with flags.
    pub fn with_flags(id: u64, mod_token: impl Into<String>, flags: u32) -> Self {
        Self {
            id,
            mod_token: mod_token.into(),
            flags: Some(flags),
        }
    }
}
