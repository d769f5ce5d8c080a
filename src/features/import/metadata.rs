//! Tag-definition file parsing
//!
//! A metadata record file holds one tag per line:
//!
//! ```text
//! # comment
//! 标题(TITLE)：Song name
//! 艺术家：Singer
//! 封面图片(COVER_IMAGE):https://example.com/cover.jpg
//! CUSTOM_TAG: anything
//! ```
//!
//! The label may carry the canonical tag name in parentheses; otherwise the
//! localized label is looked up in a fixed table. Unknown labels are kept as
//! custom tag names.

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

use super::encoding::{TextError, read_text_file};
use crate::features::media::CoverSpec;

lazy_static! {
    static ref PAREN_LABEL: Regex = Regex::new(r"\(([^)]+)\)").unwrap();
}

/// Tag name reserved for the cover image specifier
pub const COVER_IMAGE_TAG: &str = "COVER_IMAGE";

/// Localized label -> canonical tag name
const LABEL_TABLE: &[(&str, &str)] = &[
    ("标题", "TITLE"),
    ("艺术家", "ARTIST"),
    ("专辑", "ALBUM"),
    ("日期", "DATE"),
    ("流派", "GENRE"),
    ("作曲家", "COMPOSER"),
    ("词作者", "LYRICIST"),
    ("封面图片", COVER_IMAGE_TAG),
];

/// Parsed metadata record
///
/// `tags` never contains `COVER_IMAGE`; the cover is split out into `cover`
/// during parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    pub tags: BTreeMap<String, String>,
    pub cover: Option<CoverSpec>,
}

impl MetadataRecord {
    /// True when there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.cover.is_none()
    }
}

/// Map a label (or its parenthesized override) to a canonical tag name
pub fn canonical_tag_name(label: &str) -> String {
    let label = label.trim();
    let name = if label.contains('(') && label.contains(')') {
        PAREN_LABEL
            .captures(label)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .unwrap_or(label)
    } else {
        label
    };

    LABEL_TABLE
        .iter()
        .find(|(localized, _)| *localized == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Split a line into (label, value) on the first full-width colon, else the
/// first ASCII colon
fn split_line(line: &str) -> Option<(&str, &str)> {
    line.split_once('：').or_else(|| line.split_once(':'))
}

/// Parse metadata record text
pub fn parse_metadata(content: &str) -> MetadataRecord {
    let mut tags = BTreeMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((label, value)) = split_line(line) else {
            tracing::debug!("Skipping metadata line without a colon: {:?}", line);
            continue;
        };

        let tag = canonical_tag_name(label);
        let value = value.trim();
        if tag.is_empty() || value.is_empty() {
            continue;
        }

        tags.insert(tag, value.to_string());
    }

    let cover = tags.remove(COVER_IMAGE_TAG).map(|raw| CoverSpec::parse(&raw));

    MetadataRecord { tags, cover }
}

/// Read and parse a metadata record file with encoding fallback
pub fn parse_metadata_file(
    path: &Path,
    encodings: &[&'static Encoding],
) -> Result<MetadataRecord, TextError> {
    let content = read_text_file(path, encodings)?;
    let record = parse_metadata(&content);
    tracing::debug!(
        "Parsed {} tags from {:?} (cover: {})",
        record.tags.len(),
        path,
        record.cover.is_some()
    );
    Ok(record)
}
