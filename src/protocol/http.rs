//! Request head encoding and response head decoding.
//!
//! Request:
//! ```text
//! POST /bot{token}/{method} HTTP/1.1\r\n
//! Host: {host}\r\n
//! Content-Type: ...\r\n          (only with a body)
//! Content-Length: ...\r\n        (only with a body)
//! \r\n
//! ```
//!
//! Responses must carry `Content-Length`; chunked transfer is not supported.

use bytes::Bytes;

use crate::error::{BotwireError, Result};

/// Blank line ending a header block.
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Maximum size of a response header block (64 KiB).
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Default maximum response body size (64 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// `POST /bot{token}/` - the fixed part of every request line.
pub fn request_prefix(token: &str) -> String {
    format!("POST /bot{token}/")
}

/// Build the request line and headers for one call.
///
/// `headers` is the fragment produced by a codec (possibly empty).
pub fn build_request_head(prefix: &str, method: &str, host: &str, headers: &str) -> Bytes {
    Bytes::from(format!(
        "{prefix}{method} HTTP/1.1\r\nHost: {host}\r\n{headers}\r\n"
    ))
}

/// Position just past the header terminator, if present.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
        .map(|pos| pos + HEAD_TERMINATOR.len())
}

/// Decoded response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code.
    pub status: u16,
    /// Body length announced by `Content-Length`.
    pub content_length: usize,
    /// Whether the server asked to close the connection after this response.
    pub close: bool,
}

/// Parse a complete header block (terminator included or not).
///
/// # Errors
///
/// Returns `Protocol` for a malformed status line, a non-UTF-8 head, or a
/// missing/invalid `Content-Length`.
pub fn parse_head(head: &[u8]) -> Result<ResponseHead> {
    let text = std::str::from_utf8(head)
        .map_err(|_| BotwireError::Protocol("response head is not valid UTF-8".into()))?;
    let mut lines = text.split("\r\n");

    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(BotwireError::Protocol(format!(
            "unexpected status line: {status_line:?}"
        )));
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| BotwireError::Protocol(format!("invalid status line: {status_line:?}")))?;

    let mut content_length = None;
    let mut close = version == "HTTP/1.0";

    for line in lines.filter(|l| !l.is_empty()) {
        let Some((name, value)) = line.split_once(':') else {
            return Err(BotwireError::Protocol(format!("malformed header line: {line:?}")));
        };
        let value = value.trim();

        if name.eq_ignore_ascii_case("content-length") {
            let length = value.parse::<usize>().map_err(|_| {
                BotwireError::Protocol(format!("invalid Content-Length: {value:?}"))
            })?;
            content_length = Some(length);
        } else if name.eq_ignore_ascii_case("connection") {
            close = value.eq_ignore_ascii_case("close");
        }
    }

    let content_length = content_length
        .ok_or_else(|| BotwireError::Protocol("response has no Content-Length".into()))?;

    Ok(ResponseHead {
        status,
        content_length,
        close,
    })
}
