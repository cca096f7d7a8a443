//! Trigger module - handler registration and update routing.
//!
//! Provides:
//! - [`TriggerTable`] - maps commands and callback patterns to handlers
//! - [`UpdateHandler`], [`CallbackHandler`], [`LifecycleHook`] - handler traits,
//!   implemented by plain async closures

mod handler;
mod table;

pub use handler::{CallbackHandler, CallbackMatch, HandlerError, HandlerResult, LifecycleHook, UpdateHandler};
pub use table::TriggerTable;
