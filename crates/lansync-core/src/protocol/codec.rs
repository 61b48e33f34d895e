//! Text codec for the CRLF-framed wire format.
//!
//! Framing rule:
//! ```text
//! Request  : "<METHOD> <PATH> <VERSION>\r\n" {"<Key>: <Value>\r\n"} "\r\n" [body]
//! Response : "<VERSION> <CODE> <MESSAGE>\r\n" {"<Key>: <Value>\r\n"} "\r\n" [body]
//! ```
//! The body is exactly `Content-Length` bytes; the length is 0 when the
//! header is absent or does not parse as an integer.  A response MESSAGE
//! is the remainder of the start line after the first two tokens and may
//! itself contain spaces (or be empty).
//!
//! Parse failures are ordinary errors.  Callers treat a malformed message
//! as "the connection yielded no data", never as a crash.

use thiserror::Error;

use crate::protocol::message::{Headers, Method, Request, Response, CONTENT_LENGTH};

/// Header-block terminator separating headers from the body.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors that can occur while parsing a message.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// No blank line terminating the header block was found.
    #[error("missing header terminator")]
    MissingHeaderTerminator,

    /// The start line or body contained invalid UTF-8.
    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    /// The start line did not split into the required tokens.
    #[error("malformed start line: {0:?}")]
    MalformedStartLine(String),

    /// The request method token is not a recognized method.
    #[error("unknown method: {0:?}")]
    UnknownMethod(String),

    /// A header line had no `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// The response status code token is not an integer.
    #[error("invalid status code: {0:?}")]
    InvalidStatusCode(String),

    /// Fewer body bytes were available than `Content-Length` declared.
    #[error("body shorter than declared: need {declared} bytes, got {available}")]
    BodyTooShort { declared: usize, available: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parses one complete request from `raw`.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed, including when the
/// body is shorter than the declared `Content-Length`.
///
/// # Examples
///
/// ```rust
/// use lansync_core::protocol::{encode_request, parse_request};
/// use lansync_core::protocol::message::{Method, Request};
///
/// let request = Request::new(Method::Get, "/");
/// let bytes = encode_request(&request);
/// assert_eq!(parse_request(&bytes).unwrap(), request);
/// ```
pub fn parse_request(raw: &[u8]) -> Result<Request, ProtocolError> {
    let (head, rest) = split_head(raw)?;
    let mut lines = head.split("\r\n");
    let start_line = lines.next().unwrap_or("");

    let tokens: Vec<&str> = start_line.split(' ').collect();
    if tokens.len() != 3 {
        return Err(ProtocolError::MalformedStartLine(start_line.to_string()));
    }
    let method = Method::from_token(tokens[0])
        .ok_or_else(|| ProtocolError::UnknownMethod(tokens[0].to_string()))?;

    let headers = parse_headers(lines)?;
    let body = read_body(&headers, rest)?;

    Ok(Request {
        method,
        path: tokens[1].to_string(),
        version: tokens[2].to_string(),
        headers,
        body,
    })
}

/// Parses one complete response from `raw`.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed.
pub fn parse_response(raw: &[u8]) -> Result<Response, ProtocolError> {
    let (head, rest) = split_head(raw)?;
    let mut lines = head.split("\r\n");
    let start_line = lines.next().unwrap_or("");

    // VERSION and CODE are single tokens; MESSAGE is everything after them.
    let mut tokens = start_line.splitn(3, ' ');
    let version = tokens
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProtocolError::MalformedStartLine(start_line.to_string()))?;
    let code_token = tokens
        .next()
        .ok_or_else(|| ProtocolError::MalformedStartLine(start_line.to_string()))?;
    let status_code: u16 = code_token
        .parse()
        .map_err(|_| ProtocolError::InvalidStatusCode(code_token.to_string()))?;
    let status_message = tokens.next().unwrap_or("").to_string();

    let headers = parse_headers(lines)?;
    let body = read_body(&headers, rest)?;

    Ok(Response {
        version: version.to_string(),
        status_code,
        status_message,
        headers,
        body,
    })
}

/// Serializes `request` into wire bytes.
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} {}\r\n",
        request.method, request.path, request.version
    ));
    encode_headers_and_body(&mut out, &request.headers, request.body.as_deref());
    out.into_bytes()
}

/// Serializes `response` into wire bytes.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} {}\r\n",
        response.version, response.status_code, response.status_message
    ));
    encode_headers_and_body(&mut out, &response.headers, response.body.as_deref());
    out.into_bytes()
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn encode_headers_and_body(out: &mut String, headers: &Headers, body: Option<&str>) {
    for (key, value) in headers.iter() {
        out.push_str(&format!("{key}: {value}\r\n"));
    }
    out.push_str("\r\n");
    if let Some(body) = body {
        out.push_str(body);
    }
}

/// Splits `raw` at the header terminator, returning the header block as
/// text and the remaining body bytes.
fn split_head(raw: &[u8]) -> Result<(&str, &[u8]), ProtocolError> {
    let pos = raw
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
        .ok_or(ProtocolError::MissingHeaderTerminator)?;
    let head =
        std::str::from_utf8(&raw[..pos]).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok((head, &raw[pos + HEADER_TERMINATOR.len()..]))
}

/// Parses the remaining header lines of the head block.
fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Headers, ProtocolError> {
    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;
        headers.insert(key, value);
    }
    Ok(headers)
}

/// Reads exactly `Content-Length` bytes of body from `rest`.
///
/// A missing or unparsable `Content-Length` means a zero-length body, which
/// is represented as `None`.
fn read_body(headers: &Headers, rest: &[u8]) -> Result<Option<String>, ProtocolError> {
    let declared: usize = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    if declared == 0 {
        return Ok(None);
    }
    if rest.len() < declared {
        return Err(ProtocolError::BodyTooShort {
            declared,
            available: rest.len(),
        });
    }
    let body = std::str::from_utf8(&rest[..declared]).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok(Some(body.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
