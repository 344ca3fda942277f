//! [`Transport`] backed by `reqwest`.
//!
//! ```no_run
//! # async fn demo() -> Result<(), reqwest::Error> {
//! use std::sync::Arc;
//! use lens::{HttpRequest, LensClient, LensConfig, NetworkLogStore, ReqwestTransport};
//!
//! let store = Arc::new(NetworkLogStore::new());
//! let client = LensClient::instrumented(ReqwestTransport::new(), store.clone(), LensConfig::new());
//!
//! client.execute(HttpRequest::get("https://example.com")).await?;
//! assert_eq!(store.len(), 1);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::request::HttpRequest;
use crate::response::ResponseHead;
use crate::transport::{RawResponse, Transport};

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, proxies, TLS)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    type Error = reqwest::Error;
    type Prepared = reqwest::Request;

    fn prepare(&self, request: &HttpRequest) -> Result<reqwest::Request, reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.as_str())
            .headers(request.effective_headers());

        if !request.body.is_empty() {
            builder = builder.body(request.body.to_bytes());
        }

        builder.build()
    }

    async fn execute(
        &self,
        prepared: reqwest::Request,
    ) -> Result<RawResponse<reqwest::Error>, reqwest::Error> {
        let response = self.client.execute(prepared).await?;

        let head = ResponseHead {
            status: response.status(),
            version: response.version(),
            headers: response.headers().clone(),
        };

        Ok(RawResponse::new(head, Box::pin(response.bytes_stream())))
    }
}
