//! Core types for mural

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier for a piece of stream content.
///
/// Servers announce ids as JSON integers or strings; both forms round-trip
/// through the wire protocol unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentId::Number(n) => write!(f, "{n}"),
            ContentId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ContentId {
    fn from(n: i64) -> Self {
        ContentId::Number(n)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        ContentId::Text(s.to_string())
    }
}

impl FromStr for ContentId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(n) => ContentId::Number(n),
            Err(_) => ContentId::Text(s.to_string()),
        })
    }
}

/// A fully rendered post fragment ready for insertion into the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub rendered: String,
}

/// Connection lifecycle as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}
