//! Trigger table: routes an update to at most one handler.
//!
//! - Commands (`/start`, `/help@my_bot`) are keyed by their case-folded
//!   name and resolved from the first message entity.
//! - Patterns are tried against callback-button data in registration
//!   order; the first full match wins.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use super::handler::{CallbackHandler, CallbackMatch, UpdateHandler};
use crate::envelope::Envelope;
use crate::error::Result;

/// Registered commands and callback patterns.
#[derive(Clone, Default)]
pub struct TriggerTable {
    commands: HashMap<String, Arc<dyn UpdateHandler>>,
    patterns: Vec<(Regex, Arc<dyn CallbackHandler>)>,
}

impl TriggerTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. A leading `/` is ignored and the name is
    /// case-folded; registering the same name again replaces the handler.
    pub fn register_command(&mut self, name: &str, handler: Arc<dyn UpdateHandler>) {
        let name = fold_case(name.strip_prefix('/').unwrap_or(name));
        self.commands.insert(name, handler);
    }

    /// Register a pattern that must match the whole callback data.
    pub fn register_pattern(&mut self, pattern: &str, handler: Arc<dyn CallbackHandler>) -> Result<()> {
        let regex = Regex::new(&format!(r"\A(?:{pattern})\z"))?;
        self.patterns.push((regex, handler));
        Ok(())
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// The command handler for `message`, if it starts with a known command.
    ///
    /// `me_username` is the bot's own username; a command addressed to any
    /// other bot (`/start@otherbot`) never matches.
    pub fn resolve_command(&self, message: &Envelope, me_username: Option<&str>) -> Option<Arc<dyn UpdateHandler>> {
        if self.commands.is_empty() {
            return None;
        }
        if message["forward_date"].is_truthy() && message["chat"]["type"].as_str() != Some("private") {
            return None;
        }

        let entities = if message["entities"].is_truthy() {
            &message["entities"]
        } else {
            &message["caption_entities"]
        };
        let entity = &entities[0];
        if entity["offset"].as_i64() != Some(0) || entity["type"].as_str() != Some("bot_command") {
            return None;
        }

        let text = message["text"]
            .as_str()
            .filter(|text| !text.is_empty())
            .or_else(|| message["caption"].as_str())
            .unwrap_or_default();
        let length = usize::try_from(entity["length"].as_i64()?).ok()?;

        let mut chars = utf16_prefix(text, length).chars();
        chars.next()?;
        let command = fold_case(chars.as_str());

        let handler = match command.split_once('@') {
            None => self.commands.get(&command),
            Some((name, target)) => {
                if target != fold_case(me_username?) {
                    return None;
                }
                self.commands.get(name)
            }
        };
        handler.cloned()
    }

    /// The first pattern fully matching `data`, with its captures.
    pub fn resolve_pattern(&self, data: &str) -> Option<(Arc<dyn CallbackHandler>, CallbackMatch)> {
        self.patterns.iter().find_map(|(regex, handler)| {
            regex
                .captures(data)
                .map(|captures| (handler.clone(), CallbackMatch::new(regex, &captures)))
        })
    }
}

/// Caseless form of `text` for command lookup.
///
/// Lowercases, then applies the full folds that lowercasing leaves alone
/// (`ß` to `ss`, the Latin ligatures, final sigma). Other multi-character
/// folds from the Unicode tables are not covered.
fn fold_case(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        match ch {
            'ß' => folded.push_str("ss"),
            'ſ' => folded.push('s'),
            'ς' => folded.push('σ'),
            'ﬀ' => folded.push_str("ff"),
            'ﬁ' => folded.push_str("fi"),
            'ﬂ' => folded.push_str("fl"),
            'ﬃ' => folded.push_str("ffi"),
            'ﬄ' => folded.push_str("ffl"),
            'ﬅ' | 'ﬆ' => folded.push_str("st"),
            other => folded.push(other),
        }
    }
    folded
}

/// The longest prefix of `text` spanning at most `units` UTF-16 code units.
///
/// Entity offsets and lengths are measured in UTF-16.
fn utf16_prefix(text: &str, units: usize) -> &str {
    let mut counted = 0;
    for (index, ch) in text.char_indices() {
        counted += ch.len_utf16();
        if counted > units {
            return &text[..index];
        }
    }
    text
}
