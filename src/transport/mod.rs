//! Transport module - pooled connections to the remote API host.
//!
//! Provides:
//! - [`Connector`] implementations that open TLS or plain TCP streams
//! - [`Connection`] for one request/response exchange at a time
//! - [`ConnectionPool`] bounding concurrent requests and reusing connections

mod connection;
mod connector;
mod pool;

pub use connection::Connection;
pub use connector::{BoxedStream, Connector, IoStream, PlainConnector, TlsConnector};
pub use pool::{ConnectionPool, DEFAULT_MAX_CONNECTIONS};
