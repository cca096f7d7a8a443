//! Protocol module - HTTP/1.1 framing for the RPC transport.
//!
//! This module implements the small subset of HTTP/1.1 the remote API needs:
//! - Request head building (`POST /bot{token}/{method}`)
//! - Response head parsing (status line, `Content-Length`, `Connection`)
//! - Response buffer for accumulating partial reads

mod http;
mod response;
mod response_buffer;

pub use http::{
    build_request_head, find_head_end, parse_head, request_prefix, ResponseHead,
    DEFAULT_MAX_BODY_SIZE, HEAD_TERMINATOR, MAX_HEAD_SIZE,
};
pub use response::HttpResponse;
pub use response_buffer::ResponseBuffer;
