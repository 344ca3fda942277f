use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::response::system_time_millis;

/// Change notifications broadcast by a `NetworkLogStore`.
///
/// Events carry positions, not entries: a subscriber re-reads the store
/// (`get` / `snapshot`) when it wants the data, so it always renders the
/// latest state even if it missed intermediate notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// A new entry was appended at `index`
    Appended {
        index: usize,
        epoch: u64,
        #[serde(with = "system_time_millis")]
        timestamp: SystemTime,
    },

    /// The entry at `index` changed in place
    Updated {
        index: usize,
        epoch: u64,
        #[serde(with = "system_time_millis")]
        timestamp: SystemTime,
    },

    /// The store was emptied; `epoch` is the new epoch
    Cleared {
        epoch: u64,
        #[serde(with = "system_time_millis")]
        timestamp: SystemTime,
    },
}

impl LogEvent {
    pub fn appended(index: usize, epoch: u64) -> Self {
        Self::Appended {
            index,
            epoch,
            timestamp: SystemTime::now(),
        }
    }

    pub fn updated(index: usize, epoch: u64) -> Self {
        Self::Updated {
            index,
            epoch,
            timestamp: SystemTime::now(),
        }
    }

    pub fn cleared(epoch: u64) -> Self {
        Self::Cleared {
            epoch,
            timestamp: SystemTime::now(),
        }
    }

    /// Index the event refers to; `None` for `Cleared`
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Appended { index, .. } => Some(*index),
            Self::Updated { index, .. } => Some(*index),
            Self::Cleared { .. } => None,
        }
    }

    pub fn epoch(&self) -> u64 {
        match self {
            Self::Appended { epoch, .. } => *epoch,
            Self::Updated { epoch, .. } => *epoch,
            Self::Cleared { epoch, .. } => *epoch,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            Self::Appended { timestamp, .. } => *timestamp,
            Self::Updated { timestamp, .. } => *timestamp,
            Self::Cleared { timestamp, .. } => *timestamp,
        }
    }

    /// Variant name, e.g. `"Appended"`
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Appended { .. } => "Appended",
            Self::Updated { .. } => "Updated",
            Self::Cleared { .. } => "Cleared",
        }
    }
}
