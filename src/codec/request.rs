//! Pending request: method name, arguments and an optional file.
//!
//! # Example
//!
//! ```
//! use botwire::codec::{InputFile, Request};
//!
//! let request = Request::new("sendDocument")
//!     .arg("chat_id", 10885151)
//!     .arg("caption", "weekly report")
//!     .file(InputFile::from_bytes("document", &b"report body"[..]).name("report.txt"));
//!
//! assert_eq!(request.method(), "sendDocument");
//! assert!(request.input_file().is_some());
//! ```

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{EncodedBody, FilePart, JsonCodec, MultipartCodec};
use crate::error::Result;

/// File name used when neither a declared name nor a path is available.
pub const UNNAMED_FILE: &str = "unnamed";

/// Fallback MIME type when the name gives no hint.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Where file contents come from.
pub enum FileSource {
    /// In-memory contents.
    Bytes(Bytes),
    /// A file on disk, opened and closed during encoding.
    Path(PathBuf),
    /// Any async reader, drained during encoding.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            FileSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            FileSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// File attached to a call.
#[derive(Debug)]
pub struct InputFile {
    field: String,
    source: FileSource,
    name: Option<String>,
    mime: Option<String>,
}

impl InputFile {
    /// Attach in-memory contents under form field `field`.
    pub fn from_bytes(field: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(field, FileSource::Bytes(data.into()))
    }

    /// Attach the file at `path`. Its file name becomes the default name.
    pub fn from_path(field: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(field, FileSource::Path(path.into()))
    }

    /// Attach everything readable from `reader`.
    pub fn from_reader<R>(field: impl Into<String>, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::new(field, FileSource::Reader(Box::new(reader)))
    }

    fn new(field: impl Into<String>, source: FileSource) -> Self {
        Self {
            field: field.into(),
            source,
            name: None,
            mime: None,
        }
    }

    /// Override the announced file name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the MIME type.
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Form field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Name announced to the remote: declared name, then the path's file
    /// name, then [`UNNAMED_FILE`].
    pub fn file_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_owned();
        }
        if let FileSource::Path(path) = &self.source {
            if let Some(name) = path.file_name() {
                return name.to_string_lossy().into_owned();
            }
        }
        UNNAMED_FILE.to_owned()
    }

    /// Declared MIME type, else a guess from `name`, else [`DEFAULT_MIME`].
    pub fn mime_type(&self, name: &str) -> String {
        match &self.mime {
            Some(mime) if !mime.is_empty() => mime.clone(),
            _ => mime_guess::from_path(name)
                .first_raw()
                .unwrap_or(DEFAULT_MIME)
                .to_owned(),
        }
    }

    /// Read the contents and resolve name and MIME type.
    ///
    /// Path sources are opened and closed here; nothing stays open past
    /// this call.
    pub async fn into_part(self) -> Result<FilePart> {
        let name = self.file_name();
        let mime = self.mime_type(&name);

        let data = match self.source {
            FileSource::Bytes(data) => data,
            FileSource::Path(path) => Bytes::from(tokio::fs::read(&path).await?),
            FileSource::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Bytes::from(buf)
            }
        };

        Ok(FilePart {
            field: self.field,
            name,
            mime,
            data,
        })
    }
}

/// One outbound call.
///
/// Constructed per call and consumed by [`encode`](Request::encode).
#[derive(Debug)]
pub struct Request {
    method: String,
    args: Map<String, Value>,
    file: Option<InputFile>,
}

impl Request {
    /// Call `method` with no arguments.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: Map::new(),
            file: None,
        }
    }

    /// Add one argument.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Add one argument from any serializable value.
    pub fn arg_serialized<T: Serialize>(mut self, key: impl Into<String>, value: &T) -> Result<Self> {
        self.args.insert(key.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Add every entry of `args`.
    pub fn args(mut self, args: Map<String, Value>) -> Self {
        self.args.extend(args);
        self
    }

    /// Attach a file; the call is then sent as multipart.
    pub fn file(mut self, file: InputFile) -> Self {
        self.file = Some(file);
        self
    }

    /// Method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Arguments so far.
    pub fn arguments(&self) -> &Map<String, Value> {
        &self.args
    }

    /// Attached file, if any.
    pub fn input_file(&self) -> Option<&InputFile> {
        self.file.as_ref()
    }

    /// Encode into header fragment and body chunks.
    ///
    /// Returns the method name alongside the body since the request is
    /// consumed.
    pub async fn encode(self) -> Result<(String, EncodedBody)> {
        let body = match self.file {
            Some(file) => MultipartCodec::encode(&self.args, file.into_part().await?),
            None => JsonCodec::encode(&self.args)?,
        };
        Ok((self.method, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_name_defaults() {
        assert_eq!(
            InputFile::from_bytes("photo", &b"x"[..]).name("cat.png").file_name(),
            "cat.png"
        );
        assert_eq!(
            InputFile::from_path("document", "/tmp/some/report.pdf").file_name(),
            "report.pdf"
        );
        assert_eq!(InputFile::from_bytes("document", &b"x"[..]).file_name(), UNNAMED_FILE);
    }

    #[test]
    fn test_mime_defaults() {
        let file = InputFile::from_bytes("photo", &b"x"[..]);
        assert_eq!(file.mime_type("cat.png"), "image/png");
        assert_eq!(file.mime_type(UNNAMED_FILE), DEFAULT_MIME);

        let file = file.mime("image/webp");
        assert_eq!(file.mime_type("cat.png"), "image/webp");
    }

    #[test]
    fn test_builder_collects_args() {
        let mut extra = Map::new();
        extra.insert("parse_mode".into(), json!("HTML"));

        let request = Request::new("sendMessage")
            .arg("chat_id", 1)
            .arg("text", "hi")
            .args(extra)
            .arg_serialized("reply_markup", &json!({"remove_keyboard": true}))
            .unwrap();

        assert_eq!(
            Value::Object(request.arguments().clone()),
            json!({
                "chat_id": 1,
                "text": "hi",
                "parse_mode": "HTML",
                "reply_markup": {"remove_keyboard": true},
            })
        );
    }

    #[tokio::test]
    async fn test_encode_plain_is_json() {
        let (method, body) = Request::new("getMe").encode().await.unwrap();
        assert_eq!(method, "getMe");
        assert!(body.chunks.is_empty());

        let (_, body) = Request::new("sendMessage").arg("text", "x").encode().await.unwrap();
        assert!(body.headers.contains("application/json"));
    }

    #[tokio::test]
    async fn test_encode_reads_path_and_closes_it() {
        let path = std::env::temp_dir().join(format!("botwire-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"file contents").await.unwrap();

        let (_, body) = Request::new("sendDocument")
            .arg("chat_id", 1)
            .file(InputFile::from_path("document", &path))
            .encode()
            .await
            .unwrap();

        // File handle released: removing succeeds on every platform.
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(body.headers.contains("multipart/form-data"));
        assert!(body.chunks.iter().any(|c| &c[..] == b"file contents"));
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(body
            .chunks
            .iter()
            .any(|c| String::from_utf8_lossy(c).contains(&format!("filename=\"{file_name}\""))));
    }

    #[tokio::test]
    async fn test_encode_missing_path_fails() {
        let result = Request::new("sendDocument")
            .file(InputFile::from_path("document", "/definitely/not/here.bin"))
            .encode()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_encode_reader_source() {
        let reader = std::io::Cursor::new(b"streamed".to_vec());
        let part = InputFile::from_reader("voice", reader).into_part().await.unwrap();

        assert_eq!(&part.data[..], b"streamed");
        assert_eq!(part.name, UNNAMED_FILE);
        assert_eq!(part.mime, DEFAULT_MIME);
    }
}
