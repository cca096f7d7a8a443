//! `multipart/form-data` body codec.
//!
//! Layout:
//! ```text
//! --{boundary}\r\n
//! Content-Disposition: form-data; name="{key}"\r\n
//! \r\n
//! {value}\r\n                                   (one part per argument)
//! --{boundary}\r\n
//! Content-Disposition: form-data; name="{field}"; filename="{name}"\r\n
//! Content-Type: {mime}\r\n
//! \r\n
//! {file bytes}                                  (own chunk, never copied)
//! \r\n--{boundary}--\r\n
//! ```
//!
//! Field names and the file name are quoted the way browsers submit forms:
//! `"`, CR and LF become `%22`, `%0D` and `%0A`.
//!
//! The boundary is not checked against the payload. A file that happens to
//! contain the random boundary will produce a broken body.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use serde_json::{Map, Value};

use super::EncodedBody;

/// A file already read into memory, ready to be framed.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name (e.g. `document`, `photo`).
    pub field: String,
    /// File name announced to the remote.
    pub name: String,
    /// MIME type of the content.
    pub mime: String,
    /// File contents.
    pub data: Bytes,
}

/// Encodes call arguments plus one file as `multipart/form-data`.
pub struct MultipartCodec;

impl MultipartCodec {
    /// Random boundary: 128 bits from a v4 UUID, base64 without padding.
    pub fn generate_boundary() -> String {
        STANDARD_NO_PAD.encode(uuid::Uuid::new_v4().as_bytes())
    }

    /// Encode with a fresh random boundary.
    pub fn encode(args: &Map<String, Value>, file: FilePart) -> EncodedBody {
        Self::encode_with_boundary(args, file, &Self::generate_boundary())
    }

    /// Encode with a caller-chosen boundary.
    pub fn encode_with_boundary(
        args: &Map<String, Value>,
        file: FilePart,
        boundary: &str,
    ) -> EncodedBody {
        let mut chunks = Vec::with_capacity(args.len() + 3);

        for (key, value) in args {
            let Some(rendered) = render_value(value) else {
                continue;
            };
            chunks.push(Bytes::from(format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{rendered}\r\n",
                escape_param(key)
            )));
        }

        chunks.push(Bytes::from(format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            escape_param(&file.field),
            escape_param(&file.name),
            file.mime
        )));
        if !file.data.is_empty() {
            chunks.push(file.data);
        }
        chunks.push(Bytes::from(format!("\r\n--{boundary}--\r\n")));

        let length: usize = chunks.iter().map(Bytes::len).sum();
        EncodedBody {
            headers: format!(
                "Content-Type: multipart/form-data; boundary={boundary}\r\nContent-Length: {length}\r\n"
            ),
            chunks,
        }
    }
}

/// Make `value` safe inside a quoted `Content-Disposition` parameter.
fn escape_param(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// String form of an argument; `None` for nulls, which are left out.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
