//! LRC document scanner
//!
//! Supports `[mm:ss]` and `[mm:ss.cc]` line timestamps (several per line) and
//! the `[ar:]`, `[ti:]`, `[al:]`, `[au:]`, `[offset:]` header tags.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use super::types::LyricDocument;

lazy_static! {
    /// `[mm:ss]` or `[mm:ss.cc]`
    pub(crate) static ref TIMESTAMP: Regex =
        Regex::new(r"\[([0-9]{2}):([0-9]{2})(?:\.([0-9]{2}))?\]").unwrap();
}

/// Header tag prefix -> canonical tag name
const HEADER_TAGS: &[(&str, &str)] = &[
    ("[ar:", "ARTIST"),
    ("[ti:", "TITLE"),
    ("[al:", "ALBUM"),
    ("[au:", "COMPOSER"),
    ("[offset:", "OFFSET"),
];

/// Remove every timestamp token and trim the remainder
///
/// Repeats until no token is left, since removing one token can join the
/// text around it into a new one.
pub fn strip_timestamps(line: &str) -> String {
    let mut text = TIMESTAMP.replace_all(line, "").into_owned();
    while TIMESTAMP.is_match(&text) {
        text = TIMESTAMP.replace_all(&text, "").into_owned();
    }
    text.trim().to_string()
}

/// Whether the line contains at least one timestamp token
pub fn has_timestamp(line: &str) -> bool {
    TIMESTAMP.is_match(line)
}

/// Parse a timestamp token match into centiseconds
pub(crate) fn token_to_centis(caps: &regex::Captures<'_>) -> Option<u64> {
    let min: u64 = caps.get(1)?.as_str().parse().ok()?;
    let sec: u64 = caps.get(2)?.as_str().parse().ok()?;
    let centis: u64 = match caps.get(3) {
        Some(c) => c.as_str().parse().ok()?,
        None => 0,
    };
    Some(min * 6000 + sec * 100 + centis)
}

/// Write centiseconds as an `[mm:ss.cc]` token
///
/// Minutes above 99 widen the field rather than wrap.
pub fn format_timestamp(centis: u64) -> String {
    let min = centis / 6000;
    let sec = (centis / 100) % 60;
    let cc = centis % 100;
    format!("[{:02}:{:02}.{:02}]", min, sec, cc)
}

/// Extract a header tag value from a trimmed line
///
/// The value runs from the end of the prefix to the last `]`. A malformed
/// offset (not an integer) yields nothing.
fn parse_header_tag(line: &str) -> Option<(&'static str, String)> {
    let &(prefix, name) = HEADER_TAGS
        .iter()
        .find(|(prefix, _)| line.starts_with(prefix))?;

    let end = line.rfind(']')?;
    if end < prefix.len() {
        return None;
    }
    let value = &line[prefix.len()..end];

    if name == "OFFSET" {
        match value.trim().parse::<i64>() {
            Ok(offset) => Some((name, offset.to_string())),
            Err(_) => {
                tracing::debug!("Ignoring malformed offset tag: {:?}", line);
                None
            }
        }
    } else {
        Some((name, value.to_string()))
    }
}

/// Scan LRC text into a lyric document
pub fn parse_lrc(src: &str) -> LyricDocument {
    let mut tags = BTreeMap::new();
    let mut timed_lines = Vec::new();

    for line in src.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((name, value)) = parse_header_tag(line) {
            tags.insert(name.to_string(), value);
        }

        if has_timestamp(line) {
            timed_lines.push(line.to_string());
        }
    }

    LyricDocument::new(tags, timed_lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_single_line() {
        let doc = parse_lrc("[ar:X]\n[ti:Y]\n[00:01.00]hello\n");
        assert_eq!(doc.tags.len(), 2);
        assert_eq!(doc.tags["ARTIST"], "X");
        assert_eq!(doc.tags["TITLE"], "Y");
        assert_eq!(doc.timed_lyrics(), "[00:01.00]hello");
        assert_eq!(doc.pure_lyrics(), "hello");
    }

    #[test]
    fn test_all_header_tags() {
        let doc = parse_lrc("[ar:A]\n[ti:T]\n[al:Al]\n[au:C]\n[offset:+500]");
        assert_eq!(doc.tags["ALBUM"], "Al");
        assert_eq!(doc.tags["COMPOSER"], "C");
        assert_eq!(doc.tags["OFFSET"], "500");
        assert!(!doc.has_lyrics());
    }

    #[test]
    fn test_malformed_offset_skipped() {
        let doc = parse_lrc("[offset:abc]\n[00:01.00]x");
        assert!(!doc.tags.contains_key("OFFSET"));
    }

    #[test]
    fn test_duplicate_tags_last_wins() {
        let doc = parse_lrc("[ti:First]\n[ti:Second]");
        assert_eq!(doc.tags["TITLE"], "Second");
    }

    #[test]
    fn test_multiple_timestamps_kept_verbatim() {
        let doc = parse_lrc("[00:12.50][01:30.00]Repeated line\n[00:05]short form");
        assert_eq!(
            doc.timed_lyrics(),
            "[00:12.50][01:30.00]Repeated line\n[00:05]short form"
        );
        assert_eq!(doc.pure_lyrics(), "Repeated line\nshort form");
    }

    #[test]
    fn test_blank_and_bracket_remnants_dropped_from_pure() {
        let doc = parse_lrc("[00:01.00]\n[00:02.00][tr:x]\n[00:03.00] kept ");
        assert_eq!(doc.timed_lines().len(), 3);
        assert_eq!(doc.pure_lyrics(), "kept");
    }

    #[test]
    fn test_three_digit_fraction_is_not_a_token() {
        // Only two-digit centiseconds are recognized
        let doc = parse_lrc("[00:10.254]text");
        assert!(!doc.has_lyrics());
    }

    #[test]
    fn test_pure_lyrics_never_contains_tokens() {
        let doc = parse_lrc(
            "[00:01.00]a[00:02.00]b\n[00:03.00][00:04.00]c [00:05]\n[xx:yy]d\n[00:06.00]e",
        );
        assert!(!TIMESTAMP.is_match(&doc.pure_lyrics()));
    }

    #[test]
    fn test_nested_token_remnant_is_stripped() {
        let doc = parse_lrc("x[0[00:01.00]0:02]");
        assert_eq!(doc.pure_lyrics(), "x");
    }

    #[test]
    fn test_empty_input() {
        let doc = parse_lrc("");
        assert!(doc.is_empty());
        assert_eq!(doc.timed_lyrics(), "");
        assert_eq!(doc.pure_lyrics(), "");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "[00:00.00]");
        assert_eq!(format_timestamp(1234), "[00:12.34]");
        assert_eq!(format_timestamp(6000 * 3 + 501), "[03:05.01]");
    }
}
