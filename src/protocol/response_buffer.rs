//! Response buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented responses:
//! - `WaitingForHead`: scanning for the `\r\n\r\n` terminator
//! - `WaitingForBody`: head parsed, need `Content-Length` body bytes
//!
//! # Example
//!
//! ```
//! use botwire::protocol::ResponseBuffer;
//!
//! let mut buffer = ResponseBuffer::new();
//!
//! assert!(buffer.push(b"HTTP/1.1 200 OK\r\nContent-Le").unwrap().is_none());
//! let response = buffer.push(b"ngth: 2\r\n\r\nok").unwrap().unwrap();
//!
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.body(), b"ok");
//! ```

use bytes::BytesMut;

use super::http::{find_head_end, parse_head, ResponseHead, DEFAULT_MAX_BODY_SIZE, MAX_HEAD_SIZE};
use super::HttpResponse;
use crate::error::{BotwireError, Result};

/// State machine for response parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for the complete header block.
    WaitingForHead,
    /// Head parsed, waiting for body bytes.
    WaitingForBody { head: ResponseHead },
}

/// Buffer for accumulating incoming bytes and extracting complete responses.
///
/// One buffer belongs to one connection and is reused across requests.
pub struct ResponseBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed body size.
    max_body_size: usize,
}

impl ResponseBuffer {
    /// Create a new buffer with default settings.
    ///
    /// Default capacity: 16KB, max body: 64MB.
    pub fn new() -> Self {
        Self::with_max_body(DEFAULT_MAX_BODY_SIZE)
    }

    /// Create a new buffer with a custom max body size.
    pub fn with_max_body(max_body_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForHead,
            max_body_size,
        }
    }

    /// Push data into the buffer and extract a response if one is complete.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if the head is malformed, the head grows past
    /// [`MAX_HEAD_SIZE`] without a terminator, or the announced body exceeds
    /// the configured maximum.
    pub fn push(&mut self, data: &[u8]) -> Result<Option<HttpResponse>> {
        self.buffer.extend_from_slice(data);
        self.try_extract()
    }

    /// Try to extract one response from already buffered bytes.
    pub fn try_extract(&mut self) -> Result<Option<HttpResponse>> {
        match &self.state {
            State::WaitingForHead => {
                let Some(end) = find_head_end(&self.buffer) else {
                    if self.buffer.len() > MAX_HEAD_SIZE {
                        return Err(BotwireError::Protocol(format!(
                            "response head exceeds {MAX_HEAD_SIZE} bytes"
                        )));
                    }
                    return Ok(None);
                };

                let head = parse_head(&self.buffer[..end])?;
                if head.content_length > self.max_body_size {
                    return Err(BotwireError::Protocol(format!(
                        "Body size {} exceeds maximum {}",
                        head.content_length, self.max_body_size
                    )));
                }

                // Consume head bytes
                let _ = self.buffer.split_to(end);
                self.state = State::WaitingForBody { head };

                self.try_extract()
            }

            State::WaitingForBody { head } => {
                if self.buffer.len() < head.content_length {
                    return Ok(None);
                }

                let head = head.clone();
                let body = self.buffer.split_to(head.content_length).freeze();
                self.state = State::WaitingForHead;

                Ok(Some(HttpResponse::new(head, body)))
            }
        }
    }

    /// Called when the peer closed the stream.
    ///
    /// Any partially received response is discarded; the caller gets the
    /// `ConnectionClosed` error to report.
    pub fn finish(&mut self) -> BotwireError {
        self.clear();
        BotwireError::ConnectionClosed
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether no response is partially buffered.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::WaitingForHead) && self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHead;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHead => "WaitingForHead",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}
