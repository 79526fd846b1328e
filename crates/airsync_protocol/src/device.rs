//! Device and ping bookkeeping.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote-wipe status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RemoteWipeStatus {
    /// No wipe requested.
    #[default]
    None,
    /// Device provisioned, no wipe pending.
    Ok,
    /// A wipe has been requested but not yet confirmed.
    Pending,
    /// The device confirmed the wipe.
    Wiped,
}

impl RemoteWipeStatus {
    /// Encodes to the stored code.
    pub fn to_code(&self) -> u8 {
        match self {
            RemoteWipeStatus::None => 0,
            RemoteWipeStatus::Ok => 1,
            RemoteWipeStatus::Pending => 2,
            RemoteWipeStatus::Wiped => 3,
        }
    }

    /// Decodes the stored code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RemoteWipeStatus::None),
            1 => Some(RemoteWipeStatus::Ok),
            2 => Some(RemoteWipeStatus::Pending),
            3 => Some(RemoteWipeStatus::Wiped),
            _ => None,
        }
    }
}

/// Everything the server tracks about one client device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    /// The client-chosen device id.
    pub dev_id: String,
    /// The provisioning policy key, 0 if never provisioned.
    pub policy_key: u64,
    /// Remote-wipe status.
    pub remote_wipe: RemoteWipeStatus,
    /// The negotiated heartbeat interval, if any.
    pub heartbeat_interval: Option<Duration>,
    /// Server ids of the folders this device knows about.
    pub known_folders: Vec<String>,
}

impl DeviceState {
    /// Creates state for a newly seen device.
    pub fn new(dev_id: impl Into<String>) -> Self {
        Self {
            dev_id: dev_id.into(),
            policy_key: 0,
            remote_wipe: RemoteWipeStatus::default(),
            heartbeat_interval: None,
            known_folders: Vec::new(),
        }
    }

    /// Returns true if the device has a provisioning policy key.
    pub fn is_provisioned(&self) -> bool {
        self.policy_key != 0
    }
}

/// Generates a random 10-digit provisioning policy key.
pub fn generate_policy_key() -> u64 {
    rand::thread_rng().gen_range(1_000_000_000..=9_999_999_999)
}

/// Heartbeat/long-poll state for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingState {
    /// Server ids of the collections being watched.
    pub collections: Vec<String>,
    /// Remaining lifetime budget for the long poll.
    pub lifetime: Duration,
}

impl PingState {
    /// Creates a ping state watching the given collections.
    pub fn new(collections: Vec<String>, lifetime: Duration) -> Self {
        Self {
            collections,
            lifetime,
        }
    }

    /// Adds a collection to the watch list, once.
    pub fn watch(&mut self, collection_id: &str) {
        if !self.is_watching(collection_id) {
            self.collections.push(collection_id.to_string());
        }
    }

    /// Returns true if the collection is being watched.
    pub fn is_watching(&self, collection_id: &str) -> bool {
        self.collections.iter().any(|c| c == collection_id)
    }

    /// Clears the watched collections and the lifetime budget.
    pub fn reset(&mut self) {
        self.collections.clear();
        self.lifetime = Duration::ZERO;
    }
}
