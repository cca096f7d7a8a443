//! JSON body codec.

use bytes::Bytes;
use serde_json::{Map, Value};

use super::EncodedBody;
use crate::error::Result;

/// Encodes call arguments as a single `application/json` chunk.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode the argument mapping.
    ///
    /// An empty mapping produces no body and no headers.
    pub fn encode(args: &Map<String, Value>) -> Result<EncodedBody> {
        if args.is_empty() {
            return Ok(EncodedBody::empty());
        }

        let body = serde_json::to_vec(args)?;
        Ok(EncodedBody {
            headers: format!(
                "Content-Type: application/json\r\nContent-Length: {}\r\n",
                body.len()
            ),
            chunks: vec![Bytes::from(body)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_args_produce_no_body() {
        let body = JsonCodec::encode(&Map::new()).unwrap();
        assert!(body.headers.is_empty());
        assert!(body.chunks.is_empty());
        assert_eq!(body.content_length(), 0);
    }

    #[test]
    fn test_encode_args() {
        let args = json!({"chat_id": 10885151, "text": "Hi Lonami!"});
        let body = JsonCodec::encode(args.as_object().unwrap()).unwrap();

        assert!(body.headers.starts_with("Content-Type: application/json\r\n"));
        assert!(body
            .headers
            .contains(&format!("Content-Length: {}\r\n", body.content_length())));

        let decoded: Value = serde_json::from_slice(&body.chunks[0]).unwrap();
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_unicode_length_is_in_bytes() {
        let args = json!({"text": "héllo ✓"});
        let body = JsonCodec::encode(args.as_object().unwrap()).unwrap();
        assert_eq!(body.content_length(), body.chunks[0].len());
        assert!(body.content_length() > "{\"text\":\"héllo ✓\"}".chars().count());
    }
}
