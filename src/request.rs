use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::materializer::{charset_of, decode_text, format_size, is_textual};

/// Outgoing request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RequestBody {
    #[default]
    Empty,
    Text(String),
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` fields, in order
    Form(Vec<(String, String)>),
    Binary(Bytes),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            Self::Json(_) => false,
            Self::Form(fields) => fields.is_empty(),
            Self::Binary(bytes) => bytes.is_empty(),
        }
    }

    /// Content type implied by the body kind
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Text(_) => Some("text/plain; charset=utf-8"),
            Self::Json(_) => Some("application/json"),
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
            Self::Binary(_) => Some("application/octet-stream"),
        }
    }

    /// Wire bytes for this body
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Text(text) => Bytes::from(text.clone()),
            Self::Json(value) => Bytes::from(value.to_string()),
            Self::Form(fields) => Bytes::from(encode_form(fields)),
            Self::Binary(bytes) => bytes.clone(),
        }
    }
}

fn encode_form(fields: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

/// An outgoing HTTP request.
///
/// This is also the request half of a log entry: the store keeps a clone
/// of what the application sent, so it can be re-rendered or turned into
/// a curl command later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    #[serde(with = "method_serde")]
    pub method: Method,

    pub url: String,

    #[serde(with = "header_map_serde", default)]
    pub headers: HeaderMap,

    #[serde(default)]
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Append a header (builder pattern)
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Append a header from strings, validating both parts
    pub fn try_header(self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| LensError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| LensError::InvalidHeader(format!("{}: {}", name, e)))?;
        Ok(self.header(name, value))
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = RequestBody::Text(text.into());
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Serialize `payload` as the JSON body
    pub fn json_from<T: Serialize>(self, payload: &T) -> Result<Self> {
        let value = serde_json::to_value(payload)?;
        Ok(self.json(value))
    }

    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Binary(bytes.into());
        self
    }

    /// Host part of the URL, if the URL parses
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    /// Effective content type: the explicit header, else the body's default
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| self.body.default_content_type().map(str::to_string))
    }

    /// Headers as they go on the wire: explicit headers plus a
    /// `Content-Type` implied by the body when none was set.
    pub fn effective_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if !headers.contains_key(CONTENT_TYPE) {
            if let Some(content_type) = self.body.default_content_type() {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }
        headers
    }

    /// Body rendered as text for display.
    ///
    /// Binary bodies are decoded only when the content type says they
    /// are text; otherwise `None`.
    pub fn body_text(&self) -> Option<String> {
        match &self.body {
            RequestBody::Empty => None,
            RequestBody::Text(text) => Some(text.clone()),
            RequestBody::Json(value) => serde_json::to_string_pretty(value).ok(),
            RequestBody::Form(fields) => Some(encode_form(fields)),
            RequestBody::Binary(bytes) => {
                let content_type = self.content_type()?;
                if !is_textual(&content_type) {
                    return None;
                }
                let charset = charset_of(&content_type);
                decode_text(bytes, charset.as_deref())
            }
        }
    }

    /// Formatted body size, from `Content-Length` when present.
    pub fn content_length(&self) -> String {
        let declared = self
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        let size = declared.unwrap_or_else(|| self.body.to_bytes().len() as u64);
        format_size(size)
    }

    /// Equivalent `curl` invocation for reproducing this request.
    pub fn to_curl(&self) -> String {
        let mut parts = vec![
            "curl".to_string(),
            "-X".to_string(),
            self.method.as_str().to_string(),
        ];

        let headers = self.effective_headers();
        for (name, value) in headers.iter() {
            if matches!(self.body, RequestBody::Form(_)) && *name == CONTENT_TYPE {
                // curl sets its own multipart content type for -F
                continue;
            }
            parts.push(format!(
                "-H \"{}: {}\"",
                name.as_str(),
                escape_double(&String::from_utf8_lossy(value.as_bytes()))
            ));
        }

        match &self.body {
            RequestBody::Empty => {}
            RequestBody::Form(fields) => {
                for (key, value) in fields {
                    parts.push(format!(
                        "-F \"{}={}\"",
                        escape_double(key),
                        escape_double(value)
                    ));
                }
            }
            RequestBody::Text(text) => parts.push(format!("-d '{}'", escape_single(text))),
            RequestBody::Json(value) => {
                parts.push(format!("-d '{}'", escape_single(&value.to_string())))
            }
            RequestBody::Binary(_) => parts.push("--data-binary @-".to_string()),
        }

        parts.push(format!("\"{}\"", escape_double(&self.url)));
        parts.join(" ")
    }
}

fn escape_single(text: &str) -> String {
    text.replace('\'', r"'\''")
}

fn escape_double(text: &str) -> String {
    text.replace('\\', r"\\").replace('"', "\\\"")
}

mod method_serde {
    use http::Method;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Method, D::Error>
    where
        D: Deserializer<'de>,
    {
        let method = String::deserialize(deserializer)?;
        Method::from_bytes(method.as_bytes()).map_err(D::Error::custom)
    }
}

mod header_map_serde {
    use http::header::{HeaderName, HeaderValue};
    use http::HeaderMap;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(headers: &HeaderMap, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let pairs: Vec<(&str, String)> = headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HeaderMap, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(String, String)>::deserialize(deserializer)?;
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(D::Error::custom)?;
            let value = HeaderValue::from_str(&value).map_err(D::Error::custom)?;
            headers.append(name, value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{ACCEPT, AUTHORIZATION};
    use serde_json::json;

    #[test]
    fn test_builder_sets_fields() {
        let request = HttpRequest::post("https://api.example.com/users")
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .json(json!({"name": "ada"}));

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://api.example.com/users");
        assert_eq!(request.headers.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(request.body, RequestBody::Json(json!({"name": "ada"})));
        assert_eq!(request.host().as_deref(), Some("api.example.com"));
    }

    #[test]
    fn test_try_header_rejects_invalid_name() {
        let result = HttpRequest::get("https://example.com").try_header("bad name", "x");
        match result {
            Err(LensError::InvalidHeader(_)) => {}
            other => panic!("Expected InvalidHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_json_from_struct() {
        #[derive(Serialize)]
        struct Login {
            user: String,
        }

        let request = HttpRequest::post("https://example.com/login")
            .json_from(&Login {
                user: "ada".to_string(),
            })
            .unwrap();
        assert_eq!(request.body, RequestBody::Json(json!({"user": "ada"})));
    }

    #[test]
    fn test_effective_headers_add_body_content_type() {
        let request = HttpRequest::post("https://example.com").json(json!({}));
        let headers = request.effective_headers();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");

        let explicit = HttpRequest::post("https://example.com")
            .header(CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"))
            .json(json!({}));
        assert_eq!(
            explicit.effective_headers().get(CONTENT_TYPE).unwrap(),
            "application/vnd.api+json"
        );
    }

    #[test]
    fn test_body_text() {
        assert_eq!(HttpRequest::get("https://example.com").body_text(), None);

        let text = HttpRequest::post("https://example.com").text("plain");
        assert_eq!(text.body_text().as_deref(), Some("plain"));

        let form = HttpRequest::post("https://example.com").form([("q", "a b"), ("page", "2")]);
        assert_eq!(form.body_text().as_deref(), Some("q=a+b&page=2"));

        let binary = HttpRequest::post("https://example.com").bytes(vec![0u8, 159, 146, 150]);
        assert_eq!(binary.body_text(), None);

        let textual_binary = HttpRequest::post("https://example.com")
            .header(CONTENT_TYPE, HeaderValue::from_static("text/csv"))
            .bytes(&b"a,b\n1,2"[..]);
        assert_eq!(textual_binary.body_text().as_deref(), Some("a,b\n1,2"));
    }

    #[test]
    fn test_content_length() {
        assert_eq!(HttpRequest::get("https://example.com").content_length(), "0 B");

        let body = HttpRequest::post("https://example.com").bytes(vec![0u8; 2048]);
        assert_eq!(body.content_length(), "2 KB");

        let declared = HttpRequest::post("https://example.com")
            .header(CONTENT_LENGTH, HeaderValue::from_static("512"))
            .bytes(vec![0u8; 10]);
        assert_eq!(declared.content_length(), "512 B");
    }

    #[test]
    fn test_curl_for_json_post() {
        let request = HttpRequest::post("https://api.example.com/users")
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer abc"))
            .json(json!({"name": "o'neil"}));

        assert_eq!(
            request.to_curl(),
            "curl -X POST -H \"authorization: Bearer abc\" -H \"content-type: application/json\" \
             -d '{\"name\":\"o'\\''neil\"}' \"https://api.example.com/users\""
        );
    }

    #[test]
    fn test_curl_for_get_without_body() {
        let request = HttpRequest::get("https://example.com/ping");
        assert_eq!(request.to_curl(), "curl -X GET \"https://example.com/ping\"");
    }

    #[test]
    fn test_curl_for_form_and_binary() {
        let form = HttpRequest::post("https://example.com/upload").form([("title", "x")]);
        assert_eq!(
            form.to_curl(),
            "curl -X POST -F \"title=x\" \"https://example.com/upload\""
        );

        let binary = HttpRequest::put("https://example.com/blob").bytes(vec![1u8, 2, 3]);
        assert_eq!(
            binary.to_curl(),
            "curl -X PUT -H \"content-type: application/octet-stream\" --data-binary @- \"https://example.com/blob\""
        );
    }

    #[test]
    fn test_request_serialization_roundtrip() {
        let request = HttpRequest::delete("https://example.com/items/1")
            .header(ACCEPT, HeaderValue::from_static("*/*"))
            .text("bye");

        let serialized = serde_json::to_string(&request).unwrap();
        assert!(serialized.contains("\"method\":\"DELETE\""));

        let parsed: HttpRequest = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed, request);
    }
}
