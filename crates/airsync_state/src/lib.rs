//! # AirSync State
//!
//! The sync state machine: per-collection folder state, the delta
//! engine, durable snapshot storage with compare-and-swap, the
//! two-phase pass driver, and the ping/long-poll machinery.
//!
//! The flow a server crate drives:
//! 1. [`SyncEngine::sync_pass`] loads state for the client's sync key
//!    and returns either stored bytes to replay or a [`SyncPass`] with
//!    changes to send.
//! 2. The response is encoded and sent.
//! 3. [`SyncEngine::commit_pass`] persists the new snapshot as pending;
//!    it becomes committed when the client echoes the new key.
//!
//! Backends implement [`Backend`]; persistence implements
//! [`StateStore`]. Both are injected at engine construction.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod delta;
mod engine;
mod error;
mod folder;
mod ping;
mod store;

pub use backend::{Backend, BackendError, BackendResult, MockBackend};
pub use config::HeartbeatConfig;
pub use delta::DeltaEngine;
pub use engine::{PassOutcome, Resolution, SyncEngine, SyncPass};
pub use error::{StateError, StateResult};
pub use folder::FolderState;
pub use ping::{PingMonitor, PingOutcome, PingStateCache};
pub use store::{MemoryStateStore, PendingPass, Snapshot, StateStore, StoredState};
