//! Lyric document types

use std::collections::BTreeMap;

use super::lrc::strip_timestamps;

/// A parsed lyric document
///
/// Only the timed lines are stored. The plain rendering is always derived
/// from them by stripping timestamp tokens, so the two can never disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LyricDocument {
    /// Header tags (ARTIST, TITLE, ALBUM, COMPOSER, OFFSET)
    pub tags: BTreeMap<String, String>,
    /// Lines carrying at least one timestamp token, verbatim and in file order
    timed_lines: Vec<String>,
}

impl LyricDocument {
    pub fn new(tags: BTreeMap<String, String>, timed_lines: Vec<String>) -> Self {
        Self { tags, timed_lines }
    }

    /// Timed lines joined by newline, timestamps included
    pub fn timed_lyrics(&self) -> String {
        self.timed_lines.join("\n")
    }

    /// Timed lines with every timestamp token removed
    ///
    /// Lines that are blank after stripping, or that still start with `[`
    /// (bracket remnants such as word-level markers), are dropped.
    pub fn pure_lyrics(&self) -> String {
        self.timed_lines
            .iter()
            .map(|line| strip_timestamps(line))
            .filter(|line| !line.is_empty() && !line.starts_with('['))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn timed_lines(&self) -> &[String] {
        &self.timed_lines
    }

    /// Whether any timed lyric line was found
    pub fn has_lyrics(&self) -> bool {
        !self.timed_lines.is_empty()
    }

    /// No tags and no lyric lines
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.timed_lines.is_empty()
    }
}
