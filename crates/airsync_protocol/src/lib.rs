//! # AirSync Protocol
//!
//! Protocol and domain types for AirSync.
//!
//! This crate provides:
//! - [`SyncKey`] — the versioned sync cursor (`{uuid}N`)
//! - [`StatEntry`] — lightweight item summaries for change comparison
//! - [`ChangeRecord`] / [`ChangeSet`] — delta vocabulary
//! - [`Collection`] / [`FilterType`] — per-request sync context
//! - [`DeviceState`] / [`PingState`] — device bookkeeping
//! - [`ConflictDetector`] / [`ConflictPolicy`] — conflict detection
//!
//! This is a pure types crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod collection;
mod conflict;
mod device;
mod stat;
mod sync_key;

pub use change::{ChangeRecord, ChangeSet, ClientChangeType};
pub use collection::{
    Collection, CollectionClass, FilterType, APPOINTMENTS_FOLDER_UID, CONTACTS_FOLDER_UID,
    INBOX_FOLDER_ID, NOTES_FOLDER_UID, TASKS_FOLDER_UID,
};
pub use conflict::{ConflictDetector, ConflictPolicy};
pub use device::{generate_policy_key, DeviceState, PingState, RemoteWipeStatus};
pub use stat::{StatEntry, FLAG_NEW};
pub use sync_key::{SyncKey, SyncKeyError};
