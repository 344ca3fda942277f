//! # Interception
//!
//! An [`Interceptor`] observes the three stages of every call a
//! `LensClient` makes: send, response head, and completion (body fully
//! received). It only ever sees references, so it cannot change what the
//! application gets back.
//!
//! [`LensInterceptor`] is the interceptor that feeds a [`NetworkLogStore`]:
//!
//! ```text
//!        on_send                 on_headers               on_complete
//! IDLE ───────────▶ SENT ───────────────▶ RESPONDED ───────────────▶ DONE
//!   │ disabled or     │ on_send_failed         │ on_response_failed
//!   │ excluded        ▼                        ▼
//!   └─▶ Skipped    request Failed,          response Failed
//!                  response cleared
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, warn};

use crate::config::LensConfig;
use crate::materializer::ResponseMaterializer;
use crate::request::HttpRequest;
use crate::resource::ErrorInfo;
use crate::response::{HttpResponse, ResponseHead};
use crate::store::{LogHandle, NetworkLogStore, NetworkLogs};

/// Correlation data for one call, produced by `on_send` and handed back
/// to the same interceptor at every later stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTag {
    /// The interceptor is not tracking this call
    Skipped,

    /// The call has an entry in the store
    Logged(LoggedCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedCall {
    pub handle: LogHandle,
    pub sent_at: SystemTime,
    pub started: Instant,
}

impl CallTag {
    pub fn logged(&self) -> Option<&LoggedCall> {
        match self {
            Self::Logged(call) => Some(call),
            Self::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Lifecycle callbacks for calls made through a `LensClient`.
///
/// Only `on_send` is required; every other stage defaults to doing
/// nothing. Callbacks must not fail: an interceptor that runs into trouble
/// logs it and carries on.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    /// Before the request is built and sent
    async fn on_send(&self, request: &HttpRequest) -> CallTag;

    /// The request could not be built or sent
    async fn on_send_failed(&self, _tag: &CallTag, _cause: &ErrorInfo) {}

    /// Status and headers are in; the body has not been read yet
    async fn on_headers(&self, _tag: &CallTag, _head: &ResponseHead) {}

    /// Waiting for or reading the response failed
    async fn on_response_failed(&self, _tag: &CallTag, _cause: &ErrorInfo) {}

    /// The body has been fully received
    async fn on_complete(&self, _tag: &CallTag, _request: &HttpRequest, _response: &HttpResponse) {
    }
}

/// Interceptor that records every call into a [`NetworkLogStore`] and
/// mirrors it to `tracing`.
#[derive(Debug, Clone)]
pub struct LensInterceptor {
    store: Arc<NetworkLogStore>,
    config: LensConfig,
    materializer: ResponseMaterializer,
}

impl LensInterceptor {
    pub fn new(store: Arc<NetworkLogStore>, config: LensConfig) -> Self {
        let materializer = ResponseMaterializer::new(config.max_body_size);
        Self {
            store,
            config,
            materializer,
        }
    }

    pub fn store(&self) -> &Arc<NetworkLogStore> {
        &self.store
    }

    pub fn config(&self) -> &LensConfig {
        &self.config
    }
}

#[async_trait]
impl Interceptor for LensInterceptor {
    fn name(&self) -> &str {
        "lens"
    }

    async fn on_send(&self, request: &HttpRequest) -> CallTag {
        if !self.config.should_log(request) {
            debug!("Not capturing {} {}", request.method, request.url);
            return CallTag::Skipped;
        }

        let sent_at = SystemTime::now();
        let started = Instant::now();
        let handle = self
            .store
            .append(NetworkLogs::sent(request.clone(), self.config.level));

        debug!(
            index = handle.index,
            "REQUEST: {} {} ({})",
            request.method,
            request.url,
            request.content_length()
        );

        CallTag::Logged(LoggedCall {
            handle,
            sent_at,
            started,
        })
    }

    async fn on_send_failed(&self, tag: &CallTag, cause: &ErrorInfo) {
        let Some(call) = tag.logged() else {
            return;
        };

        warn!(index = call.handle.index, "REQUEST FAILED: {}", cause);
        let cause = cause.clone();
        self.store
            .update(call.handle, move |log| log.fail_request(cause));
    }

    async fn on_headers(&self, tag: &CallTag, head: &ResponseHead) {
        if let Some(call) = tag.logged() {
            debug!(
                index = call.handle.index,
                "RESPONSE HEADERS: {} after {} ms",
                head.status,
                call.started.elapsed().as_millis()
            );
        }
    }

    async fn on_response_failed(&self, tag: &CallTag, cause: &ErrorInfo) {
        let Some(call) = tag.logged() else {
            return;
        };

        warn!(index = call.handle.index, "RESPONSE FAILED: {}", cause);
        let cause = cause.clone();
        self.store.update(call.handle, move |log| {
            log.fail_response(cause);
        });
    }

    async fn on_complete(&self, tag: &CallTag, request: &HttpRequest, response: &HttpResponse) {
        let Some(call) = tag.logged() else {
            return;
        };

        let elapsed_millis = call.started.elapsed().as_millis() as u64;
        let level = self.config.level;
        let mut data = self.materializer.snapshot(
            request,
            response,
            level.captures_headers(),
            level.captures_body(),
        );
        // same starting point as response_time_millis
        data.request_time = call.sent_at;

        debug!(
            index = call.handle.index,
            "RESPONSE: {} {} -> {} in {} ms ({})",
            request.method,
            request.url,
            data.status,
            elapsed_millis,
            data.content_length
        );

        let recorded = self.store.update(call.handle, move |log| {
            log.resolve_response(data, elapsed_millis);
        });
        if !recorded {
            debug!(
                index = call.handle.index,
                "Entry was cleared before its response arrived"
            );
        }
    }
}
