//! Versioned sync cursors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors from parsing or advancing a sync key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncKeyError {
    /// The key does not match `{uuid}N`. The client must restart the
    /// sync lineage from the empty key.
    #[error("invalid sync key format: {0:?}")]
    InvalidFormat(String),
}

/// A versioned sync cursor marking a client/server convergence point.
///
/// The wire form is `{uuid}N`: the uuid is fixed for the lifetime of a
/// sync lineage and `N` increases by exactly one per successful pass.
/// An empty key always mints a new lineage starting at `N = 1`.
///
/// The previous key remains valid until the client echoes the new one,
/// so a lost response can be retransmitted safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncKey {
    uuid: Uuid,
    counter: u64,
}

impl SyncKey {
    /// Mints the first key of a fresh sync lineage.
    pub fn initial() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            counter: 1,
        }
    }

    /// Advances a client-presented key string.
    ///
    /// An empty string mints a fresh lineage with counter 1. Anything
    /// else must parse as `{uuid}N` (an optional leading `s` sent by
    /// some clients is tolerated) and yields the same uuid with the
    /// counter incremented by exactly one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncKeyError::InvalidFormat`] for malformed input.
    pub fn advance(previous: &str) -> Result<Self, SyncKeyError> {
        if previous.is_empty() {
            return Ok(Self::initial());
        }
        Ok(previous.parse::<Self>()?.next())
    }

    /// Returns the key that follows this one in the same lineage.
    pub fn next(&self) -> Self {
        Self {
            uuid: self.uuid,
            counter: self.counter + 1,
        }
    }

    /// The lineage uuid.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The per-lineage counter.
    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.uuid, self.counter)
    }
}

impl FromStr for SyncKey {
    type Err = SyncKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SyncKeyError::InvalidFormat(s.to_string());

        // Some clients prefix the key with a literal 's'.
        let rest = s.strip_prefix('s').unwrap_or(s);
        let rest = rest.strip_prefix('{').ok_or_else(invalid)?;
        let (uuid_part, counter_part) = rest.split_once('}').ok_or_else(invalid)?;

        let uuid = Uuid::parse_str(uuid_part).map_err(|_| invalid())?;
        if counter_part.is_empty() || !counter_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let counter: u64 = counter_part.parse().map_err(|_| invalid())?;

        Ok(Self { uuid, counter })
    }
}
