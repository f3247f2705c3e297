//! Dotted reference paths into an instance store
//!
//! A path like `user.addresses.0.city` names a location inside a store.
//! Numeric segments index lists; every other segment is an object key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between path segments
pub const SEGMENT_SEPARATOR: char = '.';

/// A parsed reference path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferencePath {
    raw: String,
    segments: Vec<String>,
}

impl ReferencePath {
    /// Split `raw` on the segment separator. Returns `None` if the path is
    /// empty or contains an empty segment (`a..b`, `.a`, `a.`).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let segments: Vec<String> = raw
            .split(SEGMENT_SEPARATOR)
            .map(str::to_string)
            .collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Individual segments, root first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The top-level store key this path starts from
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Whether the path is a single top-level key
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
