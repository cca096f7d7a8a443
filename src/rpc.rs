//! RPC client: method calls over the connection pool.
//!
//! [`RpcClient::call`] never fails. Every outcome is folded into a
//! [`Response`]:
//!
//! | outcome                        | `ok`  | `error_code`      | `cause` |
//! |--------------------------------|-------|-------------------|---------|
//! | remote returned `ok: true`     | true  | -                 | -       |
//! | remote returned `ok: false`    | false | remote's code     | -       |
//! | transport or encoding failure  | false | `-1`              | set     |
//! | body not JSON / no `ok` field  | false | `-1`              | set     |

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::codec::Request;
use crate::envelope::Envelope;
use crate::error::{BotwireError, Result};
use crate::protocol::{build_request_head, request_prefix, HttpResponse};
use crate::transport::ConnectionPool;

/// Error code used for failures that never reached the remote.
pub const TRANSPORT_ERROR_CODE: i64 = -1;

/// Error code the remote uses for a rejected token.
pub const UNAUTHORIZED_ERROR_CODE: i64 = 401;

/// Outcome of one call.
///
/// Dereferences to the [`Envelope`]: the `result` tree on success, the
/// error object otherwise.
#[derive(Debug, Clone)]
pub struct Response {
    ok: bool,
    envelope: Envelope,
    cause: Option<Arc<BotwireError>>,
    raw: Option<Bytes>,
}

impl Response {
    /// Interpret a response body.
    pub fn from_body(body: Bytes) -> Self {
        let value: Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => return Self::failure(e.into(), Some(body)),
        };

        let mut object = match value {
            Value::Object(object) => object,
            _ => {
                return Self::failure(
                    BotwireError::Protocol("response body is not a JSON object".into()),
                    Some(body),
                )
            }
        };

        match object.get("ok") {
            Some(Value::Bool(true)) => Self {
                ok: true,
                envelope: object.remove("result").map(Envelope::from).unwrap_or_default(),
                cause: None,
                raw: None,
            },
            Some(Value::Bool(false)) => Self {
                ok: false,
                envelope: Envelope::from(Value::Object(object)),
                cause: None,
                raw: None,
            },
            _ => Self::failure(
                BotwireError::Protocol("response has no boolean `ok` field".into()),
                Some(body),
            ),
        }
    }

    /// A failure that did not come from the remote.
    pub fn failure(cause: BotwireError, raw: Option<Bytes>) -> Self {
        let mut object = Map::new();
        object.insert("ok".into(), Value::Bool(false));
        object.insert("error_code".into(), TRANSPORT_ERROR_CODE.into());
        object.insert("description".into(), cause.to_string().into());

        Self {
            ok: false,
            envelope: Envelope::from(Value::Object(object)),
            cause: Some(Arc::new(cause)),
            raw,
        }
    }

    /// Whether the call succeeded.
    #[inline]
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// Error code of a failed call; `-1` for local failures.
    pub fn error_code(&self) -> Option<i64> {
        if self.ok {
            return None;
        }
        self.envelope.get("error_code").as_i64()
    }

    /// Error description of a failed call.
    pub fn description(&self) -> Option<&str> {
        if self.ok {
            return None;
        }
        self.envelope.get("description").as_str()
    }

    /// The local error behind a transport or decode failure.
    pub fn cause(&self) -> Option<&BotwireError> {
        self.cause.as_deref()
    }

    /// Body bytes that could not be decoded.
    pub fn raw_body(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Failure that never produced a remote answer.
    pub fn is_transport_failure(&self) -> bool {
        self.cause.is_some()
    }

    /// Transport failure caused by the read timeout.
    pub fn is_timeout(&self) -> bool {
        self.cause.as_deref().is_some_and(BotwireError::is_timeout)
    }

    /// Remote rejected the token.
    pub fn is_unauthorized(&self) -> bool {
        self.cause.is_none() && self.error_code() == Some(UNAUTHORIZED_ERROR_CODE)
    }

    #[inline]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn into_envelope(self) -> Envelope {
        self.envelope
    }
}

impl Deref for Response {
    type Target = Envelope;

    fn deref(&self) -> &Envelope {
        &self.envelope
    }
}

/// Issues method calls for one bot token.
pub struct RpcClient {
    pool: ConnectionPool,
    prefix: String,
    host: String,
    read_timeout: Duration,
}

impl RpcClient {
    /// Client sending `POST /bot{token}/{method}` to `host` through `pool`.
    pub fn new(token: &str, host: &str, pool: ConnectionPool, read_timeout: Duration) -> Self {
        Self {
            pool,
            prefix: request_prefix(token),
            host: host.to_owned(),
            read_timeout,
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Default per-call read timeout.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Call a method with the default read timeout.
    pub async fn call(&self, request: Request) -> Response {
        self.call_with_timeout(request, self.read_timeout).await
    }

    /// Call a method, failing with a timeout after `timeout`.
    pub async fn call_with_timeout(&self, request: Request, timeout: Duration) -> Response {
        let method = request.method().to_owned();
        match self.exchange(request, timeout).await {
            Ok(response) => {
                let response = Response::from_body(response.into_body());
                if let Some(cause) = response.cause() {
                    tracing::debug!("{} returned an undecodable body: {}", method, cause);
                }
                response
            }
            Err(e) => {
                tracing::debug!("{} failed: {}", method, e);
                Response::failure(e, None)
            }
        }
    }

    async fn exchange(&self, request: Request, timeout: Duration) -> Result<HttpResponse> {
        let (method, body) = request.encode().await?;
        let head = build_request_head(&self.prefix, &method, &self.host, &body.headers);

        let mut chunks = Vec::with_capacity(body.chunks.len() + 1);
        chunks.push(head);
        chunks.extend(body.chunks);

        self.pool.send(&chunks, timeout).await
    }

    /// `getMe`: the bot's own user object.
    pub async fn get_me(&self) -> Response {
        self.call(Request::new("getMe")).await
    }

    /// `getUpdates` long poll.
    ///
    /// The read timeout is extended by the poll timeout so an idle poll is
    /// not cut off by the transport.
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Response {
        let request = Request::new("getUpdates")
            .arg("offset", offset)
            .arg("timeout", timeout);
        self.call_with_timeout(request, self.read_timeout + Duration::from_secs(timeout))
            .await
    }

    /// `answerCallbackQuery` with no text.
    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Response {
        self.call(Request::new("answerCallbackQuery").arg("callback_query_id", callback_query_id))
            .await
    }

    /// Close pooled connections. The client reconnects on the next call.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
