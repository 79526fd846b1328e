//! Per-request sync collection context.

use crate::conflict::ConflictPolicy;
use crate::sync_key::SyncKey;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Well-known folder uid for the calendar collection.
pub const APPOINTMENTS_FOLDER_UID: &str = "@Calendar@";
/// Well-known folder uid for the contacts collection.
pub const CONTACTS_FOLDER_UID: &str = "@Contacts@";
/// Well-known folder uid for the tasks collection.
pub const TASKS_FOLDER_UID: &str = "@Tasks@";
/// Well-known folder uid for the notes collection.
pub const NOTES_FOLDER_UID: &str = "@Notes@";
/// The inbox-equivalent folder id clients fall back to.
pub const INBOX_FOLDER_ID: &str = "INBOX";

/// The class of data a collection synchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionClass {
    /// Mail folders.
    Email,
    /// Address book.
    Contacts,
    /// Calendar events.
    Calendar,
    /// Task lists.
    Tasks,
    /// Notes.
    Notes,
}

impl CollectionClass {
    /// The protocol name of this class.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionClass::Email => "Email",
            CollectionClass::Contacts => "Contacts",
            CollectionClass::Calendar => "Calendar",
            CollectionClass::Tasks => "Tasks",
            CollectionClass::Notes => "Notes",
        }
    }
}

/// The time window a client restricts a sync to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// No restriction.
    #[default]
    All,
    /// Back one day.
    OneDay,
    /// Back three days.
    ThreeDays,
    /// Back one week.
    OneWeek,
    /// Back two weeks.
    TwoWeeks,
    /// Back one month.
    OneMonth,
    /// Back three months.
    ThreeMonths,
    /// Back six months.
    SixMonths,
}

impl FilterType {
    const DAY: u64 = 60 * 60 * 24;

    /// The look-back window, or `None` for unrestricted.
    pub fn window(&self) -> Option<Duration> {
        let days = match self {
            FilterType::All => return None,
            FilterType::OneDay => 1,
            FilterType::ThreeDays => 3,
            FilterType::OneWeek => 7,
            FilterType::TwoWeeks => 14,
            FilterType::OneMonth => 31,
            FilterType::ThreeMonths => 31 * 3,
            FilterType::SixMonths => 31 * 6,
        };
        Some(Duration::from_secs(days * Self::DAY))
    }

    /// The earliest modification time to consider, or `None` for
    /// unrestricted.
    pub fn cutoff(&self, now: SystemTime) -> Option<SystemTime> {
        self.window().map(|back| now - back)
    }

    /// Decodes the wire filter-type code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FilterType::All),
            1 => Some(FilterType::OneDay),
            2 => Some(FilterType::ThreeDays),
            3 => Some(FilterType::OneWeek),
            4 => Some(FilterType::TwoWeeks),
            5 => Some(FilterType::OneMonth),
            6 => Some(FilterType::ThreeMonths),
            7 => Some(FilterType::SixMonths),
            _ => None,
        }
    }

    /// Encodes to the wire filter-type code.
    pub fn to_code(&self) -> u8 {
        match self {
            FilterType::All => 0,
            FilterType::OneDay => 1,
            FilterType::ThreeDays => 2,
            FilterType::OneWeek => 3,
            FilterType::TwoWeeks => 4,
            FilterType::OneMonth => 5,
            FilterType::ThreeMonths => 6,
            FilterType::SixMonths => 7,
        }
    }
}

/// The sync context for one collection within one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// What kind of data this collection holds.
    pub class: CollectionClass,
    /// Server folder id.
    pub folder_id: String,
    /// The key the client presented, if any.
    pub sync_key: Option<SyncKey>,
    /// The key minted for this pass, sent back to the client.
    pub new_sync_key: Option<SyncKey>,
    /// Time window restriction.
    pub filter: FilterType,
    /// Truncation limit for item bodies, if the client sent one.
    pub truncation: Option<u32>,
    /// How conflicting changes are resolved for this collection.
    pub conflict_policy: ConflictPolicy,
}

impl Collection {
    /// Creates a collection context with defaults.
    pub fn new(class: CollectionClass, folder_id: impl Into<String>) -> Self {
        Self {
            class,
            folder_id: folder_id.into(),
            sync_key: None,
            new_sync_key: None,
            filter: FilterType::All,
            truncation: None,
            conflict_policy: ConflictPolicy::default(),
        }
    }

    /// Sets the client-presented sync key.
    pub fn with_sync_key(mut self, key: SyncKey) -> Self {
        self.sync_key = Some(key);
        self
    }

    /// Sets the filter window.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the truncation limit.
    pub fn with_truncation(mut self, truncation: u32) -> Self {
        self.truncation = Some(truncation);
        self
    }

    /// Sets the conflict policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}
