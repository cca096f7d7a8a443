//! # botwire
//!
//! Async client for a JSON/HTTP bot API with long-polling update dispatch.
//!
//! ## Architecture
//!
//! - **RPC** ([`RpcClient`]): method calls framed as HTTP/1.1 requests over a
//!   bounded pool of persistent TLS connections; calls never fail, every
//!   outcome is a [`Response`]
//! - **Dispatch** ([`Bot`]): a long-poll loop that advances an update cursor
//!   and routes each update through a [`TriggerTable`] of commands and
//!   callback patterns
//!
//! ## Example
//!
//! ```ignore
//! use botwire::{Bot, Envelope, HandlerResult, Request};
//!
//! async fn echo(bot: Bot, update: Envelope) -> HandlerResult {
//!     let message = &update["message"];
//!     bot.call(
//!         Request::new("sendMessage")
//!             .arg("chat_id", message["chat"]["id"].as_i64())
//!             .arg("text", message["text"].as_str()),
//!     )
//!     .await;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> botwire::Result<()> {
//!     let bot = Bot::builder(std::env::var("BOT_TOKEN").unwrap())
//!         .on_update(echo)
//!         .build()?;
//!
//!     bot.run().await
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod protocol;
pub mod rpc;
pub mod transport;
pub mod trigger;

mod bot;

pub use bot::{Bot, BotBuilder, Cursor, LoopState};
pub use codec::{InputFile, Request};
pub use config::BotConfig;
pub use envelope::Envelope;
pub use error::{BotwireError, Result};
pub use rpc::{Response, RpcClient};
pub use trigger::{CallbackMatch, HandlerError, HandlerResult, TriggerTable};

/// Boxed future used at trait-object seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
