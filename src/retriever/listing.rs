//! Directory listing heuristic
//!
//! The target gives no hint whether a `file://` entity resolved to a file or a directory.
//! Content where every line looks like a file name is treated as a listing candidate; the
//! retriever only confirms it once at least one entry turns out to be retrievable.
use anyhow::{Context, Result};
use regex::Regex;

/// Characters a directory entry is expected to be made of.
pub const FILENAME_REGEX: &str = r"^[$.\-_~ 0-9A-Za-z]+$";

/// Line boundaries, `\r\n` counting as one.
const LINE_BREAKS: &[char] = &[
    '\n', '\r', '\x0b', '\x0c', '\x1c', '\x1d', '\x1e', '\u{85}', '\u{2028}', '\u{2029}',
];

/// Split content into lines on any of [LINE_BREAKS]. A trailing break does not start
/// another line.
pub fn split_lines(content: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = content;
    while !rest.is_empty() {
        match rest.find(LINE_BREAKS) {
            Some(at) => {
                lines.push(&rest[..at]);
                let tail = &rest[at..];
                let width = if tail.starts_with("\r\n") {
                    2
                } else {
                    tail.chars().next().map_or(1, char::len_utf8)
                };
                rest = &tail[width..];
            }
            None => {
                lines.push(rest);
                break;
            }
        }
    }
    lines
}

pub struct ListingHeuristic {
    pattern: Regex,
}

impl ListingHeuristic {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)
                .with_context(|| format!("Invalid filename regex: {}", pattern))?,
        })
    }

    pub fn is_entry(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    /// Returns the candidate entries in the order they appear, or [None] as soon as one
    /// line does not look like a file name.
    ///
    /// Empty content yields an empty listing.
    pub fn entries<'a>(&self, content: &'a str) -> Option<Vec<&'a str>> {
        let mut entries = Vec::new();
        for line in split_lines(content) {
            if !self.is_entry(line) {
                return None;
            }
            entries.push(line);
        }
        Some(entries)
    }
}
