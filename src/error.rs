//! Error types for botwire.

use thiserror::Error;

/// Main error type for all botwire operations.
///
/// RPC calls never return this directly; transport and decode failures are
/// folded into a failed [`Response`](crate::rpc::Response) that carries the
/// error as its cause. Only lifecycle operations such as
/// [`Bot::run`](crate::Bot::run) surface it as an `Err`.
#[derive(Debug, Error)]
pub enum BotwireError {
    /// I/O error during socket or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed HTTP framing (bad status line, missing Content-Length, oversized head).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection closed before a complete response arrived.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The exchange did not complete within the read timeout.
    #[error("Request timed out")]
    Timeout,

    /// Host name not usable for TLS server name indication.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(String),

    /// Pattern trigger failed to compile.
    #[error("Invalid trigger pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The remote rejected the bot token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// `start` or `run` called while the bot is not stopped.
    #[error("Bot is already running")]
    AlreadyRunning,

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BotwireError {
    /// Whether this error is a plain read timeout.
    ///
    /// Long polls end this way when the remote keeps the request open past
    /// the transport deadline; the poll loop treats it as "no updates".
    pub fn is_timeout(&self) -> bool {
        match self {
            BotwireError::Timeout => true,
            BotwireError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Result type alias using BotwireError.
pub type Result<T> = std::result::Result<T, BotwireError>;
