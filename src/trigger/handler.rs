//! Handler traits.
//!
//! Closures and async fns with the right shape implement these traits
//! directly, so registration reads like
//!
//! ```ignore
//! builder.command("start", |bot: Bot, update: Envelope| async move {
//!     let chat = update["message"]["chat"]["id"].as_i64();
//!     bot.call(Request::new("sendMessage").arg("chat_id", chat).arg("text", "hi")).await;
//!     Ok(())
//! })
//! ```

use std::collections::HashMap;
use std::future::Future;

use regex::{Captures, Regex};

use crate::bot::Bot;
use crate::envelope::Envelope;
use crate::BoxFuture;

/// Error returned by a handler. Logged, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for handler functions.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Handles one update (commands and the fallback).
pub trait UpdateHandler: Send + Sync + 'static {
    fn call(&self, bot: Bot, update: Envelope) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> UpdateHandler for F
where
    F: Fn(Bot, Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, bot: Bot, update: Envelope) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(bot, update))
    }
}

/// Handles a callback-button update whose data matched a pattern.
pub trait CallbackHandler: Send + Sync + 'static {
    fn call(&self, bot: Bot, update: Envelope, matched: CallbackMatch) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> CallbackHandler for F
where
    F: Fn(Bot, Envelope, CallbackMatch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, bot: Bot, update: Envelope, matched: CallbackMatch) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(bot, update, matched))
    }
}

/// Runs on start (`on_init`) or stop (`on_disconnect`).
pub trait LifecycleHook: Send + Sync + 'static {
    fn call(&self, bot: Bot) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> LifecycleHook for F
where
    F: Fn(Bot) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, bot: Bot) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(bot))
    }
}

/// Owned capture groups of a matched pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackMatch {
    groups: Vec<Option<String>>,
    names: HashMap<String, usize>,
}

impl CallbackMatch {
    pub(crate) fn new(regex: &Regex, captures: &Captures<'_>) -> Self {
        let groups = captures
            .iter()
            .map(|group| group.map(|m| m.as_str().to_owned()))
            .collect();
        let names = regex
            .capture_names()
            .enumerate()
            .filter_map(|(index, name)| name.map(|name| (name.to_owned(), index)))
            .collect();
        Self { groups, names }
    }

    /// The whole matched text.
    pub fn as_str(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    /// Group by index; `None` when the group did not participate.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index)?.as_deref()
    }

    /// Group by name.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.get(*self.names.get(name)?)
    }

    /// Number of groups, including the whole match.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_match_groups() {
        let regex = Regex::new(r"\A(?:vote:(?P<choice>\w+)(:(\d+))?)\z").unwrap();
        let captures = regex.captures("vote:yes").unwrap();
        let matched = CallbackMatch::new(&regex, &captures);

        assert_eq!(matched.as_str(), "vote:yes");
        assert_eq!(matched.name("choice"), Some("yes"));
        assert_eq!(matched.get(1), Some("yes"));
        assert_eq!(matched.get(3), None);
        assert_eq!(matched.get(10), None);
        assert_eq!(matched.name("missing"), None);
        assert_eq!(matched.len(), 4);
    }
}
