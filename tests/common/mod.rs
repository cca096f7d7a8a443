//! In-process fake of the bot API over plain TCP.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use botwire::transport::PlainConnector;
use botwire::{Bot, BotBuilder};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const TOKEN: &str = "123456:test-secret";

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Body decoded as JSON; `{}` for an empty body.
    pub fn json(&self) -> Value {
        if self.body.is_empty() {
            return json!({});
        }
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

/// What the server answers.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with this JSON body.
    Json(Value),
    /// Any status and raw body.
    Raw(u16, Vec<u8>),
    /// Drop the connection without answering.
    Close,
    /// Never answer.
    Hang,
    /// Answer after a pause.
    Delay(Duration, Box<Reply>),
}

impl Reply {
    pub fn result(result: Value) -> Self {
        Reply::Json(json!({"ok": true, "result": result}))
    }

    pub fn error(code: i64, description: &str) -> Self {
        Reply::Json(json!({"ok": false, "error_code": code, "description": description}))
    }

    pub fn after(self, delay: Duration) -> Self {
        Reply::Delay(delay, Box::new(self))
    }
}

type Responder = Arc<dyn Fn(&RecordedRequest) -> Reply + Send + Sync>;

/// A running fake API server.
pub struct FakeApi {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    connections: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeApi {
    pub async fn start(responder: impl Fn(&RecordedRequest) -> Reply + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let responder: Responder = Arc::new(responder);

        let task = {
            let requests = requests.clone();
            let connections = connections.clone();
            let active = active.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(
                        stream,
                        responder.clone(),
                        requests.clone(),
                        active.clone(),
                        peak.clone(),
                    ));
                }
            })
        };

        Self {
            addr,
            requests,
            connections,
            active,
            peak,
            task,
        }
    }

    /// A server that answers `getMe` and serves `updates` through
    /// `getUpdates` by offset. Anything else goes to `other`.
    pub async fn with_updates(
        updates: Vec<Value>,
        other: impl Fn(&RecordedRequest) -> Reply + Send + Sync + 'static,
    ) -> Self {
        Self::start(move |request| match request.method.as_str() {
            "getMe" => Reply::result(json!({"id": 123456, "is_bot": true, "username": "helper_bot"})),
            "getUpdates" => {
                let offset = request.json()["offset"].as_i64().unwrap_or(0);
                let pending: Vec<Value> = updates
                    .iter()
                    .filter(|u| u["update_id"].as_i64().unwrap_or(0) >= offset)
                    .cloned()
                    .collect();
                if pending.is_empty() {
                    Reply::result(json!([])).after(Duration::from_millis(20))
                } else {
                    Reply::result(Value::Array(pending))
                }
            }
            _ => other(request),
        })
        .await
    }

    pub fn connector(&self) -> PlainConnector {
        PlainConnector::new("127.0.0.1", self.addr.port())
    }

    /// Builder pointed at this server.
    pub fn bot_builder(&self) -> BotBuilder {
        Bot::builder(TOKEN)
            .endpoint("127.0.0.1", self.addr.port())
            .connector(self.connector())
            .read_timeout(Duration::from_secs(2))
            .shutdown_grace(Duration::from_secs(1))
            .handle_ctrl_c(false)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Most requests ever being answered at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    responder: Responder,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
) {
    let mut buf = Vec::new();
    loop {
        let request = match read_request(&mut stream, &mut buf).await {
            Some(request) => request,
            None => return,
        };
        requests.lock().unwrap().push(request.clone());

        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        let mut reply = responder(&request);
        while let Reply::Delay(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }
        active.fetch_sub(1, Ordering::SeqCst);

        let (status, body) = match reply {
            Reply::Json(value) => (200, value.to_string().into_bytes()),
            Reply::Raw(status, body) => (status, body),
            Reply::Close => return,
            Reply::Hang => {
                std::future::pending::<()>().await;
                return;
            }
            Reply::Delay(..) => unreachable!(),
        };

        let head = format!(
            "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            status,
            body.len()
        );
        if stream.write_all(head.as_bytes()).await.is_err() || stream.write_all(&body).await.is_err() {
            return;
        }
    }
}

async fn read_request(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<RecordedRequest> {
    let mut chunk = [0u8; 8192];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_owned();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_owned()))
        .collect();
    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = buf[head_end..head_end + length].to_vec();
    buf.drain(..head_end + length);

    let path = request_line.split(' ').nth(1).unwrap_or_default();
    let method = path.rsplit('/').next().unwrap_or_default().to_owned();

    Some(RecordedRequest {
        request_line,
        method,
        headers,
        body,
    })
}

/// Wait until `condition` holds, failing the test after five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A message update.
pub fn message_update(update_id: i64, text: &str) -> Value {
    let mut message = json!({
        "message_id": update_id,
        "date": 1_700_000_000,
        "chat": {"id": 42, "type": "private"},
        "from": {"id": 42, "is_bot": false, "first_name": "Kate"},
        "text": text
    });
    if text.starts_with('/') {
        let length = text.split(' ').next().unwrap_or_default().encode_utf16().count();
        message["entities"] = json!([{"type": "bot_command", "offset": 0, "length": length}]);
    }
    json!({"update_id": update_id, "message": message})
}

/// A callback-button update.
pub fn callback_update(update_id: i64, query_id: &str, data: &str) -> Value {
    json!({
        "update_id": update_id,
        "callback_query": {
            "id": query_id,
            "from": {"id": 42, "is_bot": false, "first_name": "Kate"},
            "chat_instance": "1",
            "data": data
        }
    })
}
