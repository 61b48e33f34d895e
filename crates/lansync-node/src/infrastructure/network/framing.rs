//! Reads exactly one framed message off a byte stream.
//!
//! A message is a start line, zero or more header lines, a blank CRLF
//! line, then exactly `Content-Length` bytes of body.  The reader stops
//! at the end of the body so the complete buffer can be handed to the
//! `lansync-core` codec, and it never consumes bytes past the message.
//!
//! The reader itself is deliberately lenient: it only locates the blank
//! line and the declared body length.  Full validation (start-line shape,
//! header syntax) is the codec's job, so a stream of garbage still
//! terminates here and fails there.

use lansync_core::protocol::message::CONTENT_LENGTH;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Errors that can occur while framing a message off a stream.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The stream ended before one full message was available.
    #[error("stream ended before a full message was read")]
    UnexpectedEof,

    /// An I/O error occurred on the underlying stream.
    #[error("I/O error while reading message: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads one message (header block plus body) into a byte buffer.
///
/// # Errors
///
/// Returns [`FramingError::UnexpectedEof`] when the stream closes
/// mid-headers or before `Content-Length` bytes of body arrived, and
/// [`FramingError::Io`] for other stream failures.
pub async fn read_message<R>(reader: &mut R) -> Result<Vec<u8>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw: Vec<u8> = Vec::new();

    // Header block: lines up to and including the blank line.
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(FramingError::UnexpectedEof);
        }
        raw.extend_from_slice(line.as_bytes());
        if line == "\r\n" || line == "\n" {
            break;
        }
    }

    // Body: exactly the declared length, no less.
    let declared = declared_body_length(&raw);
    if declared > 0 {
        let mut body = vec![0u8; declared];
        reader.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                FramingError::UnexpectedEof
            } else {
                FramingError::Io(e)
            }
        })?;
        raw.extend_from_slice(&body);
    }

    Ok(raw)
}

/// Scans the header block for `Content-Length`; 0 when absent or
/// unparsable.  The last occurrence wins, matching the codec's duplicate
/// header policy.
fn declared_body_length(head: &[u8]) -> usize {
    let Ok(text) = std::str::from_utf8(head) else {
        return 0;
    };
    let mut declared = 0;
    for line in text.split("\r\n").skip(1) {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == CONTENT_LENGTH {
                declared = value.trim().parse().unwrap_or(0);
            }
        }
    }
    declared
}

// ── Tests ─────────────────────────────────────────────────────────────────────
