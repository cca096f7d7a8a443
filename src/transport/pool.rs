//! Bounded pool of persistent connections to one host.
//!
//! # Architecture
//!
//! ```text
//! call 1 ─┐                      ┌─► slot 0: Option<Connection>
//! call 2 ─┼─► Semaphore(N) ─► idle deque ─► slot 1: Option<Connection>
//! call N+1 (suspended) ─┘        └─► slot N-1: Option<Connection>
//! ```
//!
//! The idle deque always holds `N - in_flight` slots. A slot is popped on
//! checkout and pushed back on check-in, so every connection is cycled.
//! Empty slots are filled lazily by the [`Connector`].
//!
//! # Failure policy
//!
//! A connection whose exchange failed (I/O error, timeout, malformed
//! response) or whose response carried `Connection: close` is closed and
//! its slot goes back empty; the next request on that slot reconnects.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;

use super::connection::Connection;
use super::connector::Connector;
use crate::error::{BotwireError, Result};
use crate::protocol::HttpResponse;

/// Default number of pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 4;

/// Slot bookkeeping, only ever locked for short non-async sections.
struct Slots {
    /// Slots not checked out; `None` means no connection opened yet.
    idle: VecDeque<Option<Connection>>,
    /// Bumped by `close`; connections from an older epoch are not reused.
    epoch: u64,
    /// Connections opened so far (also used as connection ids).
    opened: u64,
}

/// Pool of connections behind a bounded admission gate.
pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    capacity: usize,
    max_body_size: usize,
    semaphore: Semaphore,
    slots: Mutex<Slots>,
}

impl ConnectionPool {
    /// Create a pool of `capacity` slots. No connection is opened yet.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(connector: Arc<dyn Connector>, capacity: usize, max_body_size: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            connector,
            capacity,
            max_body_size,
            semaphore: Semaphore::new(capacity),
            slots: Mutex::new(Slots {
                idle: (0..capacity).map(|_| None).collect(),
                epoch: 0,
                opened: 0,
            }),
        }
    }

    /// Maximum concurrent requests.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots free right now.
    #[inline]
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Requests currently holding a slot.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available_slots()
    }

    /// Idle connections that are open.
    pub fn open_idle_connections(&self) -> usize {
        self.lock().idle.iter().filter(|slot| slot.is_some()).count()
    }

    /// Total connections opened over the pool's lifetime.
    pub fn connections_opened(&self) -> u64 {
        self.lock().opened
    }

    /// Send one pre-framed request and return its response.
    ///
    /// Suspends until a slot is free. The slot is released on every exit
    /// path, including failure, timeout and cancellation of this future.
    pub async fn send(&self, chunks: &[Bytes], timeout: Duration) -> Result<HttpResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| BotwireError::ConnectionClosed)?;

        let mut lease = self.checkout();
        let result = match tokio::time::timeout(timeout, lease.exchange(chunks)).await {
            Ok(result) => result,
            Err(_) => Err(BotwireError::Timeout),
        };

        let reusable = matches!(&result, Ok(response) if !response.closes_connection());
        lease.release(reusable).await;

        result
    }

    /// Close every idle connection and leave all slots empty.
    ///
    /// Connections checked out while this runs are closed when they come
    /// back. Safe to call any number of times; the pool stays usable and
    /// reconnects lazily afterwards.
    pub async fn close(&self) {
        let connections: Vec<Connection> = {
            let mut slots = self.lock();
            slots.epoch += 1;
            slots.idle.iter_mut().filter_map(Option::take).collect()
        };

        if !connections.is_empty() {
            tracing::debug!("Closing {} pooled connections", connections.len());
        }
        for connection in connections {
            connection.close().await;
        }
    }

    fn checkout(&self) -> Lease<'_> {
        let mut slots = self.lock();
        let connection = slots.idle.pop_front().flatten();
        Lease {
            pool: self,
            connection,
            epoch: slots.epoch,
            released: false,
        }
    }

    /// Return a slot. Yields the connection back if it must be closed.
    fn checkin(&self, connection: Option<Connection>, reusable: bool, epoch: u64) -> Option<Connection> {
        let mut slots = self.lock();
        if reusable && epoch == slots.epoch {
            slots.idle.push_back(connection);
            None
        } else {
            slots.idle.push_back(None);
            connection
        }
    }

    fn next_connection_id(&self) -> u64 {
        let mut slots = self.lock();
        slots.opened += 1;
        slots.opened
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A checked-out slot.
///
/// Dropping a lease without `release` (the request future was cancelled)
/// returns an empty slot; the half-used connection is dropped with it.
struct Lease<'a> {
    pool: &'a ConnectionPool,
    connection: Option<Connection>,
    epoch: u64,
    released: bool,
}

impl Lease<'_> {
    async fn exchange(&mut self, chunks: &[Bytes]) -> Result<HttpResponse> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                let stream = self.pool.connector.connect().await?;
                let id = self.pool.next_connection_id();
                tracing::debug!("Opened connection {}", id);
                Connection::new(id, stream, self.pool.max_body_size)
            }
        };

        self.connection.insert(connection).send(chunks).await
    }

    async fn release(mut self, reusable: bool) {
        self.released = true;
        let connection = self.connection.take();
        if let Some(connection) = self.pool.checkin(connection, reusable, self.epoch) {
            if !reusable {
                tracing::debug!("Discarding connection {} after failed exchange", connection.id());
            }
            connection.close().await;
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.connection = None;
            self.pool.checkin(None, false, self.epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::connector::BoxedStream;
    use crate::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// What the in-memory server does with each request.
    #[derive(Clone, Copy)]
    enum Behaviour {
        Reply,
        ReplyAndClose,
        Hang,
        Drop,
    }

    /// Connector whose streams are served by an in-memory task.
    struct MemoryConnector {
        behaviour: Behaviour,
        connects: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl MemoryConnector {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                connects: Arc::new(AtomicUsize::new(0)),
                active: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                delay: Duration::ZERO,
            }
        }
    }

    impl Connector for MemoryConnector {
        fn connect(&self) -> BoxFuture<'_, Result<BoxedStream>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (client, server) = duplex(64 * 1024);
            tokio::spawn(serve(
                server,
                self.behaviour,
                self.delay,
                self.active.clone(),
                self.peak.clone(),
            ));
            Box::pin(async move { Ok(Box::new(client) as BoxedStream) })
        }
    }

    async fn serve(
        mut stream: DuplexStream,
        behaviour: Behaviour,
        delay: Duration,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    ) {
        let mut buf = vec![0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }

            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            active.fetch_sub(1, Ordering::SeqCst);

            match behaviour {
                Behaviour::Reply => {
                    let _ = stream
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                        .await;
                }
                Behaviour::ReplyAndClose => {
                    let _ = stream
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                        .await;
                    return;
                }
                Behaviour::Hang => std::future::pending::<()>().await,
                Behaviour::Drop => return,
            }
        }
    }

    fn request() -> Vec<Bytes> {
        vec![Bytes::from_static(b"POST /botT/getMe HTTP/1.1\r\nHost: h\r\n\r\n")]
    }

    #[tokio::test]
    async fn test_connections_are_reused() {
        let connector = Arc::new(MemoryConnector::new(Behaviour::Reply));
        let connects = connector.connects.clone();
        let pool = ConnectionPool::new(connector, 1, 1024);

        for _ in 0..3 {
            let response = pool.send(&request(), TIMEOUT).await.unwrap();
            assert_eq!(response.body(), b"ok");
        }

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(pool.open_idle_connections(), 1);
        assert_eq!(pool.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_connections_are_opened_lazily() {
        let pool = ConnectionPool::new(Arc::new(MemoryConnector::new(Behaviour::Reply)), 4, 1024);
        assert_eq!(pool.connections_opened(), 0);
        assert_eq!(pool.open_idle_connections(), 0);

        pool.send(&request(), TIMEOUT).await.unwrap();
        assert_eq!(pool.connections_opened(), 1);
    }

    #[tokio::test]
    async fn test_failed_exchange_discards_and_reconnects() {
        let connector = Arc::new(MemoryConnector::new(Behaviour::Drop));
        let connects = connector.connects.clone();
        let pool = ConnectionPool::new(connector, 1, 1024);

        let err = pool.send(&request(), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, BotwireError::ConnectionClosed));
        assert_eq!(pool.available_slots(), 1);
        assert_eq!(pool.open_idle_connections(), 0);

        let _ = pool.send(&request(), TIMEOUT).await;
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connection_close_header_is_honoured() {
        let connector = Arc::new(MemoryConnector::new(Behaviour::ReplyAndClose));
        let connects = connector.connects.clone();
        let pool = ConnectionPool::new(connector, 1, 1024);

        pool.send(&request(), TIMEOUT).await.unwrap();
        pool.send(&request(), TIMEOUT).await.unwrap();

        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_releases_slot() {
        let pool = ConnectionPool::new(Arc::new(MemoryConnector::new(Behaviour::Hang)), 1, 1024);

        let err = pool
            .send(&request(), Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(pool.available_slots(), 1);
        assert_eq!(pool.open_idle_connections(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_slot() {
        let pool = Arc::new(ConnectionPool::new(
            Arc::new(MemoryConnector::new(Behaviour::Hang)),
            1,
            1024,
        ));

        let task = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.send(&request(), TIMEOUT).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.available_slots(), 0);

        task.abort();
        let _ = task.await;
        assert_eq!(pool.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_admission_is_bounded() {
        let mut connector = MemoryConnector::new(Behaviour::Reply);
        connector.delay = Duration::from_millis(50);
        let peak = connector.peak.clone();
        let pool = Arc::new(ConnectionPool::new(Arc::new(connector), 2, 1024));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.send(&request(), TIMEOUT).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(pool.connections_opened(), 2);
        assert_eq!(pool.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_pool_recovers() {
        let connector = Arc::new(MemoryConnector::new(Behaviour::Reply));
        let connects = connector.connects.clone();
        let pool = ConnectionPool::new(connector, 2, 1024);

        pool.send(&request(), TIMEOUT).await.unwrap();
        assert_eq!(pool.open_idle_connections(), 1);

        pool.close().await;
        pool.close().await;
        assert_eq!(pool.open_idle_connections(), 0);
        assert_eq!(pool.available_slots(), 2);

        pool.send(&request(), TIMEOUT).await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_during_flight_discards_on_return() {
        let mut connector = MemoryConnector::new(Behaviour::Reply);
        connector.delay = Duration::from_millis(100);
        let pool = Arc::new(ConnectionPool::new(Arc::new(connector), 1, 1024));

        let task = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.send(&request(), TIMEOUT).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.close().await;

        task.await.unwrap().unwrap();
        assert_eq!(pool.open_idle_connections(), 0);
    }
}
