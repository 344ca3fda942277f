//! # Response Materializer
//!
//! Turns a received response into an immutable [`ResponseData`] snapshot
//! that a UI can render as many times as it likes.
//!
//! The body bytes of a response can be drained exactly once. `LensClient`
//! drains them in its receive stage and hands the same `Bytes` to both the
//! application and the interceptors, so every consumer sees one buffer.
//! Callers must still materialize a given response at most once: the
//! snapshot is the one place the store keeps the decoded body.
//!
//! Decoding never fails the snapshot. A body that cannot be decoded, is
//! not textual, or is larger than the configured cap is stored as `None`
//! and the reason goes to `tracing` at debug level.

use bytes::Bytes;
use encoding_rs::Encoding;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use std::collections::BTreeMap;
use tracing::debug;

use crate::request::HttpRequest;
use crate::response::{HttpResponse, RequestSummary, ResponseData};

/// Default cap on bodies decoded into a snapshot (10MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

/// Format a byte count as `B`, `KB` or `MB` with a 1024 threshold.
///
/// Whole values drop their fraction (`2048` is `"2 KB"`), others keep at
/// most two decimals (`1536` is `"1.5 KB"`).
pub fn format_size(bytes: u64) -> String {
    if bytes < KB {
        return format!("{} B", bytes);
    }

    // pick the unit after rounding so 1048575 reads "1 MB", not "1024 KB"
    let kilobytes = round_hundredths(bytes as f64 / KB as f64);
    if kilobytes < KB as f64 {
        format!("{} KB", trim_decimal(kilobytes))
    } else {
        format!(
            "{} MB",
            trim_decimal(round_hundredths(bytes as f64 / MB as f64))
        )
    }
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn trim_decimal(value: f64) -> String {
    let formatted = format!("{:.2}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Extract the `charset` parameter from a content-type value, lowercased.
pub(crate) fn charset_of(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_ascii_lowercase())
        } else {
            None
        }
    })
}

/// Whether a content type carries text a person can read.
pub(crate) fn is_textual(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let Some((kind, subtype)) = mime.split_once('/') else {
        return false;
    };

    kind == "text"
        || subtype == "json"
        || subtype.ends_with("+json")
        || subtype == "xml"
        || subtype.ends_with("+xml")
        || subtype == "javascript"
        || subtype == "x-www-form-urlencoded"
        || subtype == "graphql"
}

/// Decode bytes with the declared charset, falling back to UTF-8.
///
/// Labels resolve the way browsers resolve them, so `latin1` and
/// `us-ascii` both decode as windows-1252. A byte-order mark overrides the
/// label. Returns `None` only when neither the declared charset nor UTF-8
/// decodes the bytes cleanly.
pub(crate) fn decode_text(bytes: &[u8], charset: Option<&str>) -> Option<String> {
    if let Some(encoding) = charset.and_then(|label| Encoding::for_label(label.as_bytes())) {
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return Some(text.into_owned());
        }
        debug!("Body is not valid {}, trying UTF-8", encoding.name());
    }

    String::from_utf8(bytes.to_vec()).ok()
}

/// Pretty-print `text` if it is JSON, otherwise return it unchanged.
pub(crate) fn pretty_json_or_raw(text: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(text),
        Err(_) => text,
    }
}

/// Flatten a header map to one comma-joined value per header name.
pub(crate) fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        flat.insert(name.as_str().to_string(), joined);
    }
    flat
}

/// Builds [`ResponseData`] snapshots from received responses.
#[derive(Debug, Clone)]
pub struct ResponseMaterializer {
    max_body_size: usize,
}

impl Default for ResponseMaterializer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

impl ResponseMaterializer {
    pub fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Snapshot a response, capturing headers and body.
    pub fn materialize(&self, request: &HttpRequest, response: &HttpResponse) -> ResponseData {
        self.snapshot(request, response, true, true)
    }

    /// Snapshot a response at the requested level of detail.
    ///
    /// Status, timing and size are always captured; headers and body only
    /// when asked for.
    pub fn snapshot(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        with_headers: bool,
        with_body: bool,
    ) -> ResponseData {
        let size = response.body().len() as u64;

        ResponseData {
            status: response.status().as_u16(),
            status_text: response
                .status()
                .canonical_reason()
                .unwrap_or_default()
                .to_string(),
            headers: if with_headers {
                flatten_headers(response.headers())
            } else {
                BTreeMap::new()
            },
            body: if with_body {
                self.decode_body(response.headers(), response.body())
            } else {
                None
            },
            request: RequestSummary::from(request),
            request_time: response.request_time(),
            response_time: response.response_time(),
            size_bytes: size,
            content_length: format_size(size),
        }
    }

    fn decode_body(&self, headers: &HeaderMap, body: &Bytes) -> Option<String> {
        if body.is_empty() {
            return None;
        }

        if body.len() > self.max_body_size {
            debug!(
                "Skipping response body of {} bytes (cap {} bytes)",
                body.len(),
                self.max_body_size
            );
            return None;
        }

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());

        if let Some(content_type) = content_type {
            if !is_textual(content_type) {
                debug!("Not decoding non-text response body: {}", content_type);
                return None;
            }
        }

        let charset = content_type.and_then(charset_of);
        match decode_text(body, charset.as_deref()) {
            Some(text) => Some(pretty_json_or_raw(text)),
            None => {
                debug!("Response body is not valid text, storing no body");
                None
            }
        }
    }
}
