use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::request::HttpRequest;
use crate::response::ResponseHead;

/// Response body as it comes off the wire. It can be drained only once.
pub type BodyStream<E> = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, E>> + Send>>;

/// Response head plus the not-yet-read body.
pub struct RawResponse<E> {
    pub head: ResponseHead,
    pub body: BodyStream<E>,
}

impl<E> std::fmt::Debug for RawResponse<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("head", &self.head)
            .field("body", &"<BodyStream>")
            .finish()
    }
}

impl<E: Send + 'static> RawResponse<E> {
    pub fn new(head: ResponseHead, body: BodyStream<E>) -> Self {
        Self { head, body }
    }

    /// Response whose body is a single, already available chunk
    pub fn from_bytes(head: ResponseHead, body: impl Into<Bytes>) -> Self {
        let chunk: std::result::Result<Bytes, E> = Ok(body.into());
        Self {
            head,
            body: Box::pin(tokio_stream::once(chunk)),
        }
    }
}

/// The HTTP client a `LensClient` drives.
///
/// The client splits a call into the stages it instruments:
///
/// 1. `prepare` builds the wire request. An error here means the request
///    was never sent.
/// 2. `execute` sends it and resolves once the response head is in.
///    Timeouts and connection failures surface here.
/// 3. The returned body stream is drained by the client. An error from
///    the stream is a failure while receiving the response.
///
/// Errors are returned to the application exactly as the transport
/// produced them.
#[async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Transport-specific request, ready to go on the wire
    type Prepared: Send;

    fn prepare(&self, request: &HttpRequest) -> std::result::Result<Self::Prepared, Self::Error>;

    async fn execute(
        &self,
        prepared: Self::Prepared,
    ) -> std::result::Result<RawResponse<Self::Error>, Self::Error>;
}
