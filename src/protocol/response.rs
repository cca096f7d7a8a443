//! A complete HTTP response.

use bytes::Bytes;

use super::http::ResponseHead;

/// One parsed response: head plus exactly `Content-Length` body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Decoded head.
    pub head: ResponseHead,
    /// Body bytes (zero-copy via `bytes::Bytes`).
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response from head and body.
    pub fn new(head: ResponseHead, body: Bytes) -> Self {
        Self { head, body }
    }

    /// HTTP status code.
    #[inline]
    pub fn status(&self) -> u16 {
        self.head.status
    }

    /// Body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Take the body.
    #[inline]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Whether the connection must not be reused after this response.
    #[inline]
    pub fn closes_connection(&self) -> bool {
        self.head.close
    }
}
