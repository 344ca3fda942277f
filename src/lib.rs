//! # Lens
//!
//! In-process HTTP traffic capture.
//!
//! A [`LensClient`] drives any [`Transport`] and reports every call to its
//! interceptors. The built-in [`LensInterceptor`] records each call into a
//! shared [`NetworkLogStore`]: one entry per request, created as soon as it
//! is sent and updated in place when the response arrives or the call
//! fails. The store broadcasts every change, so a viewer can render the
//! log live.
//!
//! Interception never changes what the application sees. Responses and
//! errors come back exactly as the transport produced them.
//!
//! # Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use http::StatusCode;
//! use lens::{
//!     HttpRequest, LensClient, LensConfig, LogLevel, NetworkLogStore, RawResponse, ResponseHead,
//!     Transport,
//! };
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Transport for Echo {
//!     type Error = Infallible;
//!     type Prepared = HttpRequest;
//!
//!     fn prepare(&self, request: &HttpRequest) -> Result<HttpRequest, Infallible> {
//!         Ok(request.clone())
//!     }
//!
//!     async fn execute(&self, request: HttpRequest) -> Result<RawResponse<Infallible>, Infallible> {
//!         Ok(RawResponse::from_bytes(ResponseHead::new(StatusCode::OK), request.url))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(NetworkLogStore::new());
//! let client = LensClient::instrumented(
//!     Echo,
//!     Arc::clone(&store),
//!     LensConfig::new().level(LogLevel::Body),
//! );
//!
//! client.execute(HttpRequest::get("https://example.com")).await.unwrap();
//!
//! let log = store.get(0).unwrap();
//! assert_eq!(log.response_data().unwrap().status, 200);
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod interceptor;
pub mod materializer;
pub mod request;
pub mod resource;
pub mod response;
pub mod store;
pub mod streaming;
pub mod transport;

#[cfg(feature = "reqwest")]
pub mod reqwest_transport;

pub use client::LensClient;
pub use config::{ExcludeFn, LensConfig, LensSettings, LogLevel, SETTINGS_FILENAME};
pub use error::{LensError, Result};
pub use events::LogEvent;
pub use interceptor::{CallTag, Interceptor, LensInterceptor, LoggedCall};
pub use materializer::{format_size, ResponseMaterializer, DEFAULT_MAX_BODY_SIZE};
pub use request::{HttpRequest, RequestBody};
pub use resource::{ErrorInfo, Resource};
pub use response::{HttpResponse, RequestSummary, ResponseData, ResponseHead, StatusClass};
pub use store::{LogHandle, NetworkLogStore, NetworkLogs, DEFAULT_EVENT_CAPACITY};
pub use streaming::LogEventStream;
pub use transport::{BodyStream, RawResponse, Transport};

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;
