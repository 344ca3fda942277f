use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode, Version};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::materializer::{charset_of, decode_text};
use crate::request::HttpRequest;

/// Status line and headers, available before the body is read.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers,
        }
    }
}

/// A fully received response, as handed back to the application.
///
/// The body has already been drained from the wire, so it can be read
/// any number of times.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    head: ResponseHead,
    body: Bytes,
    request_time: SystemTime,
    response_time: SystemTime,
}

impl HttpResponse {
    pub fn new(
        head: ResponseHead,
        body: Bytes,
        request_time: SystemTime,
        response_time: SystemTime,
    ) -> Self {
        Self {
            head,
            body,
            request_time,
            response_time,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// When the request was handed to the transport
    pub fn request_time(&self) -> SystemTime {
        self.request_time
    }

    /// When the response headers arrived
    pub fn response_time(&self) -> SystemTime {
        self.response_time
    }

    /// Body decoded with the declared charset (UTF-8 fallback)
    pub fn text(&self) -> Option<String> {
        let charset = self
            .head
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(charset_of);
        decode_text(&self.body, charset.as_deref())
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Which request a snapshot belongs to. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
}

impl From<&HttpRequest> for RequestSummary {
    fn from(request: &HttpRequest) -> Self {
        Self {
            method: request.method.as_str().to_string(),
            url: request.url.clone(),
        }
    }
}

/// Immutable snapshot of a response, safe to render repeatedly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    pub status: u16,

    #[serde(default)]
    pub status_text: String,

    /// One comma-joined value per header name
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Decoded (and pretty-printed, if JSON) body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    pub request: RequestSummary,

    #[serde(with = "system_time_millis")]
    pub request_time: SystemTime,

    #[serde(with = "system_time_millis")]
    pub response_time: SystemTime,

    pub size_bytes: u64,

    /// Human-readable body size (e.g. "2 KB")
    pub content_length: String,
}

impl ResponseData {
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status)
    }

    /// How long ago the request was sent, in the largest whole unit.
    ///
    /// Returns `None` under one second, or if `now` is before the request.
    pub fn requested_ago(&self, now: SystemTime) -> Option<String> {
        let elapsed = now.duration_since(self.request_time).ok()?;
        let seconds = elapsed.as_secs();
        let minutes = seconds / 60;
        let hours = minutes / 60;

        if hours > 0 {
            Some(format!("{} hr", hours))
        } else if minutes % 60 > 0 {
            Some(format!("{} min", minutes % 60))
        } else if seconds % 60 > 0 {
            Some(format!("{} sec", seconds % 60))
        } else {
            None
        }
    }
}

/// Coarse status category, for picking an icon or colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Informational,
    Success,
    Redirect,
    ClientError,
    ServerError,
    Unknown,
}

impl StatusClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            100..=199 => Self::Informational,
            200..=299 => Self::Success,
            300..=399 => Self::Redirect,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::ClientError | Self::ServerError)
    }
}

pub(crate) mod system_time_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}
