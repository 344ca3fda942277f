//! # Instrumented client
//!
//! [`LensClient`] wraps a [`Transport`] and runs every call through its
//! interceptors. The application gets back exactly what the transport
//! produced: the same response, or the same error value.

use bytes::BytesMut;
use std::sync::Arc;
use std::time::SystemTime;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::config::LensConfig;
use crate::interceptor::{CallTag, Interceptor, LensInterceptor};
use crate::request::HttpRequest;
use crate::resource::ErrorInfo;
use crate::response::HttpResponse;
use crate::store::NetworkLogStore;
use crate::transport::{RawResponse, Transport};

/// HTTP client with lifecycle interception.
pub struct LensClient<T: Transport> {
    transport: T,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl<T: Transport> std::fmt::Debug for LensClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.interceptors.iter().map(|i| i.name()).collect();
        f.debug_struct("LensClient")
            .field("interceptors", &names)
            .finish()
    }
}

impl<T: Transport> LensClient<T> {
    /// Client with no interceptors installed
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            interceptors: Vec::new(),
        }
    }

    /// Client that records every call into `store`
    pub fn instrumented(transport: T, store: Arc<NetworkLogStore>, config: LensConfig) -> Self {
        Self::new(transport).with_interceptor(Arc::new(LensInterceptor::new(store, config)))
    }

    /// Install an interceptor (builder pattern). Interceptors run in the
    /// order they were installed.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Send a request and receive the full response.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, T::Error> {
        let request_time = SystemTime::now();

        let mut tags = Vec::with_capacity(self.interceptors.len());
        for interceptor in &self.interceptors {
            tags.push(interceptor.on_send(&request).await);
        }

        let prepared = match self.transport.prepare(&request) {
            Ok(prepared) => prepared,
            Err(error) => {
                let cause = ErrorInfo::from_error(&error);
                for (interceptor, tag) in self.interceptors.iter().zip(&tags) {
                    interceptor.on_send_failed(tag, &cause).await;
                }
                return Err(error);
            }
        };

        let RawResponse { head, mut body } = match self.transport.execute(prepared).await {
            Ok(raw) => raw,
            Err(error) => {
                self.response_failed(&tags, &error).await;
                return Err(error);
            }
        };
        let response_time = SystemTime::now();

        for (interceptor, tag) in self.interceptors.iter().zip(&tags) {
            interceptor.on_headers(tag, &head).await;
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => buffer.extend_from_slice(&chunk),
                Err(error) => {
                    debug!(
                        "Body of {} {} failed after {} bytes",
                        request.method,
                        request.url,
                        buffer.len()
                    );
                    self.response_failed(&tags, &error).await;
                    return Err(error);
                }
            }
        }

        let response = HttpResponse::new(head, buffer.freeze(), request_time, response_time);
        for (interceptor, tag) in self.interceptors.iter().zip(&tags) {
            interceptor.on_complete(tag, &request, &response).await;
        }

        Ok(response)
    }

    async fn response_failed(&self, tags: &[CallTag], error: &T::Error) {
        let cause = ErrorInfo::from_error(error);
        for (interceptor, tag) in self.interceptors.iter().zip(tags) {
            interceptor.on_response_failed(tag, &cause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use crate::response::ResponseHead;
    use crate::transport::BodyStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::header::CONTENT_TYPE;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Debug, thiserror::Error, PartialEq)]
    enum ScriptError {
        #[error("invalid request: {0}")]
        InvalidRequest(String),
        #[error("timed out after {0} ms")]
        Timeout(u64),
        #[error("connection reset")]
        Reset,
    }

    /// How a scripted call ends
    #[derive(Clone)]
    enum Script {
        Respond {
            status: StatusCode,
            content_type: &'static str,
            body: &'static str,
        },
        FailPrepare,
        FailHeaders,
        FailBody,
    }

    /// Transport that answers from a script instead of the network.
    struct ScriptedTransport {
        script: Script,
        delay: Duration,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(script: Script) -> Self {
            Self {
                script,
                delay: Duration::ZERO,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn json(body: &'static str) -> Self {
            Self::new(Script::Respond {
                status: StatusCode::OK,
                content_type: "application/json",
                body,
            })
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        type Error = ScriptError;
        type Prepared = HttpRequest;

        fn prepare(&self, request: &HttpRequest) -> Result<HttpRequest, ScriptError> {
            match self.script {
                Script::FailPrepare => Err(ScriptError::InvalidRequest(request.url.clone())),
                _ => Ok(request.clone()),
            }
        }

        async fn execute(
            &self,
            prepared: HttpRequest,
        ) -> Result<RawResponse<ScriptError>, ScriptError> {
            self.sent.lock().push(prepared.url.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match &self.script {
                Script::Respond {
                    status,
                    content_type,
                    body,
                } => {
                    let mut headers = HeaderMap::new();
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(*content_type));
                    Ok(RawResponse::from_bytes(
                        ResponseHead::with_headers(*status, headers),
                        *body,
                    ))
                }
                Script::FailHeaders => Err(ScriptError::Timeout(30_000)),
                Script::FailBody => {
                    let chunks = vec![
                        Ok(Bytes::from_static(b"{\"partial\":")),
                        Err(ScriptError::Reset),
                    ];
                    let body: BodyStream<ScriptError> = Box::pin(tokio_stream::iter(chunks));
                    Ok(RawResponse::new(ResponseHead::new(StatusCode::OK), body))
                }
                Script::FailPrepare => unreachable!("prepare never succeeds"),
            }
        }
    }

    fn client(
        transport: ScriptedTransport,
        config: LensConfig,
    ) -> (LensClient<ScriptedTransport>, Arc<NetworkLogStore>) {
        let store = Arc::new(NetworkLogStore::new());
        let client = LensClient::instrumented(transport, Arc::clone(&store), config);
        (client, store)
    }

    #[tokio::test]
    async fn test_successful_call_is_recorded() {
        let (client, store) = client(
            ScriptedTransport::json(r#"{"id":1,"name":"lens"}"#),
            LensConfig::new().level(LogLevel::Body),
        );

        let response = client
            .execute(HttpRequest::get("https://api.example.com/users/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), &Bytes::from_static(br#"{"id":1,"name":"lens"}"#));

        let log = store.get(0).unwrap();
        let data = log.response_data().unwrap();
        assert_eq!(data.status, 200);
        assert_eq!(data.status_text, "OK");
        assert_eq!(data.request.url, "https://api.example.com/users/1");
        assert_eq!(
            data.body.as_deref(),
            Some("{\n  \"id\": 1,\n  \"name\": \"lens\"\n}")
        );
        assert!(log.response_time_millis.is_some());
    }

    #[tokio::test]
    async fn test_send_failure_is_recorded_and_returned() {
        let (client, store) = client(ScriptedTransport::new(Script::FailPrepare), LensConfig::new());

        let err = client
            .execute(HttpRequest::get("::not a url::"))
            .await
            .unwrap_err();
        assert_eq!(err, ScriptError::InvalidRequest("::not a url::".to_string()));
        assert!(client.transport().sent.lock().is_empty());

        let log = store.get(0).unwrap();
        assert!(log.request.is_failed());
        assert_eq!(
            log.request.cause().unwrap().message,
            "invalid request: ::not a url::"
        );
        assert!(log.response.is_none());
    }

    #[tokio::test]
    async fn test_headers_failure_marks_response_failed() {
        let (client, store) = client(ScriptedTransport::new(Script::FailHeaders), LensConfig::new());

        let err = client
            .execute(HttpRequest::get("https://slow.example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, ScriptError::Timeout(30_000));

        let log = store.get(0).unwrap();
        assert!(log.request.is_success());
        let response = log.response.unwrap();
        assert!(response.is_failed());
        assert_eq!(response.cause().unwrap().message, "timed out after 30000 ms");
        assert!(log.response_time_millis.is_none());
    }

    #[tokio::test]
    async fn test_body_failure_marks_response_failed() {
        let (client, store) = client(ScriptedTransport::new(Script::FailBody), LensConfig::new());

        let err = client
            .execute(HttpRequest::get("https://api.example.com/stream"))
            .await
            .unwrap_err();
        assert_eq!(err, ScriptError::Reset);

        let log = store.get(0).unwrap();
        assert!(log.response.unwrap().is_failed());
    }

    #[tokio::test]
    async fn test_disabled_level_records_nothing() {
        let (client, store) = client(
            ScriptedTransport::json("{}"),
            LensConfig::new().level(LogLevel::None),
        );

        let response = client
            .execute(HttpRequest::get("https://api.example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_excluded_request_records_nothing() {
        let (client, store) = client(
            ScriptedTransport::json("{}"),
            LensConfig::new().exclude(|request| request.url.ends_with("/health")),
        );

        client
            .execute(HttpRequest::get("https://api.example.com/health"))
            .await
            .unwrap();
        client
            .execute(HttpRequest::get("https://api.example.com/users"))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(0).unwrap().request_data().unwrap().url,
            "https://api.example.com/users"
        );
    }

    #[tokio::test]
    async fn test_concurrent_calls_get_distinct_entries() {
        let (client, store) = client(
            ScriptedTransport::json(r#"{"ok":true}"#).delayed(Duration::from_millis(5)),
            LensConfig::new(),
        );
        let client = Arc::new(client);

        let calls: Vec<_> = (0..16)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client
                        .execute(HttpRequest::get(format!("https://api.example.com/{}", i)))
                        .await
                })
            })
            .collect();
        for call in calls {
            call.await.unwrap().unwrap();
        }

        let logs = store.snapshot();
        assert_eq!(logs.len(), 16);
        assert!(logs.iter().all(|log| log.response_data().is_some()));

        let mut urls: Vec<_> = logs
            .iter()
            .map(|log| log.request_data().unwrap().url.clone())
            .collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_clear_does_not_touch_new_entries() {
        let (client, store) = client(
            ScriptedTransport::json("{}").delayed(Duration::from_secs(2)),
            LensConfig::new(),
        );
        let client = Arc::new(client);

        let slow = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .execute(HttpRequest::get("https://api.example.com/slow"))
                    .await
            })
        };

        // let the slow call register itself before clearing
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.len(), 1);
        store.clear();
        store.append(crate::store::NetworkLogs::sent(
            HttpRequest::get("https://api.example.com/fresh"),
            LogLevel::Headers,
        ));

        slow.await.unwrap().unwrap();

        let logs = store.snapshot();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].is_pending());
        assert_eq!(
            logs[0].request_data().unwrap().url,
            "https://api.example.com/fresh"
        );
    }

    #[tokio::test]
    async fn test_interceptors_run_in_installation_order() {
        struct Recorder {
            name: &'static str,
            calls: Arc<Mutex<Vec<String>>>,
        }

        #[async_trait]
        impl Interceptor for Recorder {
            fn name(&self) -> &str {
                self.name
            }

            async fn on_send(&self, _request: &HttpRequest) -> CallTag {
                self.calls.lock().push(format!("{}:send", self.name));
                CallTag::Skipped
            }

            async fn on_complete(&self, _tag: &CallTag, _req: &HttpRequest, _resp: &HttpResponse) {
                self.calls.lock().push(format!("{}:complete", self.name));
            }
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        let client = LensClient::new(ScriptedTransport::json("{}"))
            .with_interceptor(Arc::new(Recorder {
                name: "first",
                calls: Arc::clone(&calls),
            }))
            .with_interceptor(Arc::new(Recorder {
                name: "second",
                calls: Arc::clone(&calls),
            }));
        assert_eq!(client.interceptor_count(), 2);

        client
            .execute(HttpRequest::get("https://api.example.com"))
            .await
            .unwrap();

        assert_eq!(
            *calls.lock(),
            vec![
                "first:send",
                "second:send",
                "first:complete",
                "second:complete"
            ]
        );
        assert!(format!("{:?}", client).contains("second"));
    }
}
