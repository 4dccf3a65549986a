//! Localized UI strings.
//!
//! gettext-style lookup: a msgid with no catalog entry falls back to
//! itself, so an empty catalog yields the English labels.

use std::collections::HashMap;

/// Cover label shown over a shielded image.
pub const MSG_SHOW_SENSITIVE: &str = "show NSFW image";
/// Cover label shown over a revealed image.
pub const MSG_HIDE_SENSITIVE: &str = "hide NSFW image";

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, msgid: impl Into<String>, translation: impl Into<String>) -> Self {
        self.entries.insert(msgid.into(), translation.into());
        self
    }

    pub fn translate(&self, msgid: &str) -> String {
        self.entries
            .get(msgid)
            .cloned()
            .unwrap_or_else(|| msgid.to_string())
    }
}
