//! Codec module - request body encoding.
//!
//! This module turns a [`Request`] into the header fragment and body chunks
//! that the transport writes after the request line:
//!
//! - [`JsonCodec`] - `application/json` body for plain calls
//! - [`MultipartCodec`] - `multipart/form-data` body for calls carrying an [`InputFile`]
//!
//! # Design
//!
//! Codecs are marker structs with static methods, like the rest of the
//! crate's wire helpers. Bodies are kept as a list of [`bytes::Bytes`]
//! chunks so file contents are written with vectored I/O instead of being
//! copied into one contiguous buffer.
//!
//! # Example
//!
//! ```
//! use botwire::codec::JsonCodec;
//! use serde_json::json;
//!
//! let args = json!({"chat_id": 1, "text": "hi"});
//! let body = JsonCodec::encode(args.as_object().unwrap()).unwrap();
//! assert!(body.headers.contains("application/json"));
//! assert_eq!(body.content_length(), body.chunks.iter().map(|c| c.len()).sum::<usize>());
//! ```

mod json;
mod multipart;
mod request;

use bytes::Bytes;

pub use json::JsonCodec;
pub use multipart::{FilePart, MultipartCodec};
pub use request::{FileSource, InputFile, Request};

/// Encoded request body.
#[derive(Debug, Clone, Default)]
pub struct EncodedBody {
    /// Header lines (`Content-Type`, `Content-Length`), each ending in `\r\n`.
    /// Empty when there is no body.
    pub headers: String,
    /// Body chunks in write order.
    pub chunks: Vec<Bytes>,
}

impl EncodedBody {
    /// A body-less request.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total body size in bytes.
    pub fn content_length(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }
}
