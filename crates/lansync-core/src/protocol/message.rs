//! Typed request/response messages for the sync wire protocol.
//!
//! These are plain values: constructed once per I/O operation, never
//! mutated after construction, and handed to the codec in
//! [`crate::protocol::codec`] for the byte-level work.

use std::fmt;

/// Version string carried on every start line.
pub const PROTOCOL_VERSION: &str = "HTTP/1.1";

/// Header naming the exact byte length of the body.
pub const CONTENT_LENGTH: &str = "Content-Length";

/// Header naming the media type of the body.
pub const CONTENT_TYPE: &str = "Content-Type";

/// Request methods understood by the parser.
///
/// Any other start-line token is treated as a malformed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl Method {
    /// The canonical upper-case token for this method.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }

    /// Parses a start-line token; `None` for unrecognized tokens.
    pub fn from_token(token: &str) -> Option<Method> {
        match token {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            "PATCH" => Some(Method::Patch),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status code paired with its canonical reason phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub reason: &'static str,
}

impl Status {
    pub const OK: Status = Status { code: 200, reason: "OK" };
    pub const BAD_REQUEST: Status = Status { code: 400, reason: "Bad Request" };
    pub const NOT_FOUND: Status = Status { code: 404, reason: "Not Found" };
    pub const INTERNAL_SERVER_ERROR: Status = Status {
        code: 500,
        reason: "Internal Server Error",
    };
}

/// Insertion-ordered header collection.
///
/// Keys are stored trimmed of surrounding whitespace and matched
/// case-sensitively as written.  Duplicate keys are kept in order; lookup
/// returns the **last** occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a header.  Key and value are trimmed on insertion.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        self.0.push((key.trim().to_string(), value.trim().to_string()));
    }

    /// Returns the value for `key`, last occurrence winning.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One wire request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub version: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl Request {
    /// A bodyless request with the default protocol version.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            version: PROTOCOL_VERSION.to_string(),
            headers: Headers::new(),
            body: None,
        }
    }

    /// A request carrying a JSON body with matching `Content-Type` and
    /// `Content-Length` headers.
    pub fn with_json_body(method: Method, path: impl Into<String>, json: String) -> Self {
        let mut request = Request::new(method, path);
        request
            .headers
            .insert(CONTENT_TYPE, "application/json");
        request
            .headers
            .insert(CONTENT_LENGTH, json.len().to_string());
        request.body = Some(json);
        request
    }
}

/// One wire response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: String,
    pub status_code: u16,
    pub status_message: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl Response {
    /// A `text/plain` response.  An empty `body` still carries
    /// `Content-Length: 0` but is stored as `None`, matching what a parse
    /// of the encoded bytes yields.
    pub fn with_text(status: Status, body: &str) -> Self {
        Self::with_body(status, "text/plain", body.to_string())
    }

    /// An `application/json` response.
    pub fn with_json(status: Status, json: String) -> Self {
        Self::with_body(status, "application/json", json)
    }

    fn with_body(status: Status, content_type: &str, body: String) -> Self {
        let mut headers = Headers::new();
        headers.insert(CONTENT_TYPE, content_type);
        headers.insert(CONTENT_LENGTH, body.len().to_string());
        Self {
            version: PROTOCOL_VERSION.to_string(),
            status_code: status.code,
            status_message: status.reason.to_string(),
            headers,
            body: if body.is_empty() { None } else { Some(body) },
        }
    }

    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_token_round_trip() {
        for method in [
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Head,
            Method::Options,
            Method::Patch,
        ] {
            assert_eq!(Method::from_token(method.as_str()), Some(method));
        }
    }

    #[test]
    fn test_method_from_unknown_token_is_none() {
        assert_eq!(Method::from_token("BREW"), None);
        assert_eq!(Method::from_token("get"), None); // tokens are case-sensitive
    }

    #[test]
    fn test_headers_trim_and_case_sensitive_lookup() {
        let mut headers = Headers::new();
        headers.insert("  Content-Length  ", " 42 ");
        assert_eq!(headers.get("Content-Length"), Some("42"));
        assert_eq!(headers.get("content-length"), None);
    }

    #[test]
    fn test_headers_duplicate_key_last_wins() {
        let mut headers = Headers::new();
        headers.insert("X-Token", "first");
        headers.insert("X-Token", "second");
        assert_eq!(headers.get("X-Token"), Some("second"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_with_json_body_sets_exact_content_length() {
        let request =
            Request::with_json_body(Method::Post, "/track-device", r#"{"id":"a"}"#.to_string());
        assert_eq!(request.headers.get(CONTENT_LENGTH), Some("10"));
        assert_eq!(request.headers.get(CONTENT_TYPE), Some("application/json"));
    }

    #[test]
    fn test_empty_text_response_has_zero_content_length_and_no_body() {
        let response = Response::with_text(Status::BAD_REQUEST, "");
        assert_eq!(response.headers.get(CONTENT_LENGTH), Some("0"));
        assert_eq!(response.body, None);
    }

    #[test]
    fn test_is_success_covers_2xx_only() {
        let mut response = Response::with_text(Status::OK, "");
        assert!(response.is_success());
        response.status_code = 204;
        assert!(response.is_success());
        response.status_code = 300;
        assert!(!response.is_success());
        response.status_code = 404;
        assert!(!response.is_success());
    }
}
