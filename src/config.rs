//! Bot configuration.
//!
//! Every field has a default, so a config file only needs the token:
//!
//! ```
//! let config: botwire::BotConfig = serde_json::from_str(r#"{
//!     "token": "123456:secret",
//!     "timeout": 30,
//!     "sequential": true
//! }"#).unwrap();
//!
//! assert_eq!(config.max_connections, 4);
//! assert_eq!(config.read_timeout.as_secs(), 30);
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{BotwireError, Result};
use crate::protocol::DEFAULT_MAX_BODY_SIZE;
use crate::transport::DEFAULT_MAX_CONNECTIONS;

/// Default long-poll timeout in seconds.
pub const DEFAULT_POLL_TIMEOUT: u64 = 10;

/// Default API host.
pub const DEFAULT_HOST: &str = "api.telegram.org";

/// Default API port.
pub const DEFAULT_PORT: u16 = 443;

/// Default transport read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time given to in-flight handlers on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Runtime options for a [`Bot`](crate::Bot).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot token, `"<id>:<secret>"`.
    pub token: String,
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    pub timeout: u64,
    /// Handle updates one at a time, in order.
    pub sequential: bool,
    /// Pool size; also the bound on concurrent requests.
    pub max_connections: usize,
    pub host: String,
    pub port: u16,
    /// Per-request transport timeout (seconds in config files).
    #[serde(deserialize_with = "seconds")]
    pub read_timeout: Duration,
    /// How long `Stopping` waits for concurrent handlers (seconds in config files).
    #[serde(deserialize_with = "seconds")]
    pub shutdown_grace: Duration,
    /// Largest response body accepted, in bytes.
    pub max_body_size: usize,
    /// Stop on Ctrl-C.
    pub handle_ctrl_c: bool,
}

impl BotConfig {
    /// Defaults with the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Reject values the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(BotwireError::Config("token must not be empty".into()));
        }
        if self.host.is_empty() {
            return Err(BotwireError::Config("host must not be empty".into()));
        }
        if self.max_connections == 0 {
            return Err(BotwireError::Config("max_connections must be at least 1".into()));
        }
        Ok(())
    }

    /// Public part of the token, safe to log.
    pub fn bot_id(&self) -> &str {
        self.token.split(':').next().unwrap_or_default()
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            timeout: DEFAULT_POLL_TIMEOUT,
            sequential: false,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            handle_ctrl_c: true,
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_id", &self.bot_id())
            .field("timeout", &self.timeout)
            .field("sequential", &self.sequential)
            .field("max_connections", &self.max_connections)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("read_timeout", &self.read_timeout)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("max_body_size", &self.max_body_size)
            .field("handle_ctrl_c", &self.handle_ctrl_c)
            .finish()
    }
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
