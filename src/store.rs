//! # Network Log Store
//!
//! The ordered list of captured calls and the single source of truth a UI
//! renders from.
//!
//! - `append` assigns the next index under the write lock, so concurrent
//!   sends never share or overwrite a slot.
//! - `update_at` is bounds-checked and never grows the list.
//! - `clear` empties the list and bumps the epoch. Handles issued before
//!   the clear can no longer touch anything, even when their index is
//!   back in range.
//!
//! Every change is broadcast as a [`LogEvent`]; readers pull the data
//! itself with [`NetworkLogStore::snapshot`] or [`NetworkLogStore::get`].

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::LogLevel;
use crate::error::Result;
use crate::events::LogEvent;
use crate::request::HttpRequest;
use crate::resource::{ErrorInfo, Resource};
use crate::response::ResponseData;
use crate::streaming::{broadcast_stream, LogEventStream};

/// Default number of change events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One captured HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLogs {
    /// Level the call was captured at
    pub level: LogLevel,

    pub request: Resource<HttpRequest>,

    /// `None` once the request failed and no response can follow
    pub response: Option<Resource<ResponseData>>,

    /// Send-to-response time, set when the response resolves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_millis: Option<u64>,
}

impl NetworkLogs {
    /// Entry for a request that has just been sent
    pub fn sent(request: HttpRequest, level: LogLevel) -> Self {
        Self {
            level,
            request: Resource::success(request),
            response: Some(Resource::Loading),
            response_time_millis: None,
        }
    }

    /// The request, whether it succeeded or failed
    pub fn request_data(&self) -> Option<&HttpRequest> {
        self.request.data()
    }

    /// The response snapshot, only once it resolved successfully
    pub fn response_data(&self) -> Option<&ResponseData> {
        self.response.as_ref().and_then(Resource::success_data)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.response, Some(Resource::Loading))
    }

    /// Mark the request failed and drop the response slot.
    pub fn fail_request(&mut self, cause: ErrorInfo) {
        let request = std::mem::replace(&mut self.request, Resource::Loading);
        self.request = match request {
            Resource::Success { data } => Resource::failed(Some(data), Some(cause)),
            Resource::Failed { data, .. } => Resource::failed(data, Some(cause)),
            Resource::Loading => Resource::failed(None, Some(cause)),
        };
        self.response = None;
    }

    /// Mark a still-pending response failed. Returns false if the
    /// response had already resolved.
    pub fn fail_response(&mut self, cause: ErrorInfo) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.response = Some(Resource::failed(None, Some(cause)));
        true
    }

    /// Resolve a still-pending response. Returns false if the response
    /// had already resolved or the request failed.
    pub fn resolve_response(&mut self, data: ResponseData, elapsed_millis: u64) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.response = Some(Resource::success(data));
        self.response_time_millis = Some(elapsed_millis);
        true
    }
}

/// Position of an entry, valid only within the epoch it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogHandle {
    pub index: usize,
    pub epoch: u64,
}

#[derive(Debug, Default)]
struct Entries {
    logs: Vec<NetworkLogs>,
    epoch: u64,
}

/// Shared, observable store of captured calls.
///
/// Constructed explicitly and shared through `Arc`; two clients can log
/// into one store or into separate ones.
#[derive(Debug)]
pub struct NetworkLogStore {
    entries: RwLock<Entries>,
    events: broadcast::Sender<LogEvent>,
}

impl Default for NetworkLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkLogStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: RwLock::new(Entries::default()),
            events,
        }
    }

    /// Append an entry; its index is the length before the append.
    pub fn append(&self, entry: NetworkLogs) -> LogHandle {
        let mut entries = self.entries.write();
        let handle = LogHandle {
            index: entries.logs.len(),
            epoch: entries.epoch,
        };
        entries.logs.push(entry);
        let _ = self.events.send(LogEvent::appended(handle.index, handle.epoch));
        handle
    }

    /// Apply `transform` to the entry at `index`, if there is one.
    ///
    /// Out-of-range indices are ignored. Returns whether anything ran.
    pub fn update_at<F>(&self, index: usize, transform: F) -> bool
    where
        F: FnOnce(&mut NetworkLogs),
    {
        let mut entries = self.entries.write();
        let epoch = entries.epoch;
        match entries.logs.get_mut(index) {
            Some(entry) => {
                transform(entry);
                let _ = self.events.send(LogEvent::updated(index, epoch));
                true
            }
            None => {
                debug!("Ignoring update for index {} outside the store", index);
                false
            }
        }
    }

    /// Like `update_at`, but also ignores handles from before a `clear`.
    pub fn update<F>(&self, handle: LogHandle, transform: F) -> bool
    where
        F: FnOnce(&mut NetworkLogs),
    {
        let mut entries = self.entries.write();
        if entries.epoch != handle.epoch {
            debug!(
                "Ignoring update for index {} from cleared epoch {}",
                handle.index, handle.epoch
            );
            return false;
        }
        match entries.logs.get_mut(handle.index) {
            Some(entry) => {
                transform(entry);
                let _ = self
                    .events
                    .send(LogEvent::updated(handle.index, handle.epoch));
                true
            }
            None => false,
        }
    }

    /// Remove every entry and start a new epoch.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.logs.clear();
        entries.epoch += 1;
        debug!("Cleared network logs, now at epoch {}", entries.epoch);
        let _ = self.events.send(LogEvent::cleared(entries.epoch));
    }

    /// Copy of the current entries, in order
    pub fn snapshot(&self) -> Vec<NetworkLogs> {
        self.entries.read().logs.clone()
    }

    pub fn get(&self, index: usize) -> Option<NetworkLogs> {
        self.entries.read().logs.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().logs.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.entries.read().epoch
    }

    /// Receive change events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }

    /// Change events as a stream; lagged notifications are skipped
    pub fn stream(&self) -> LogEventStream {
        broadcast_stream(self.subscribe())
    }

    /// Current entries as pretty-printed JSON
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }
}
