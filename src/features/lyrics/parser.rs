//! Lyric document parsing
//!
//! Reads LRC-style files (line timestamps plus header tags) in whatever
//! legacy encoding they were saved with.

mod lrc;
mod types;

pub use lrc::{format_timestamp, has_timestamp, parse_lrc, strip_timestamps};
pub(crate) use lrc::{TIMESTAMP, token_to_centis};
pub use types::LyricDocument;

use encoding_rs::Encoding;
use std::path::Path;

use crate::features::import::{TextError, read_text_file};

/// Parse a lyric file with encoding fallback
///
/// A file without any recognizable tag or timed line yields an empty
/// document; only an unreadable file or an exhausted encoding list is an
/// error.
pub fn parse_lyrics_file(
    path: &Path,
    encodings: &[&'static Encoding],
) -> Result<LyricDocument, TextError> {
    let content = read_text_file(path, encodings)?;
    let document = parse_lrc(&content);
    tracing::debug!(
        "Loaded {} timed lyric lines and {} tags from {:?}",
        document.timed_lines().len(),
        document.tags.len(),
        path
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::import::encoding::default_encodings;

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lrc");
        std::fs::write(
            &path,
            "[ar:测试歌手]\n[ti:测试歌曲]\n[al:测试专辑]\n[00:12.34]第一行歌词\n[00:23.45]第二行歌词\n",
        )
        .unwrap();

        let doc = parse_lyrics_file(&path, &default_encodings()).unwrap();
        assert_eq!(doc.tags["ARTIST"], "测试歌手");
        assert_eq!(doc.tags["TITLE"], "测试歌曲");
        assert_eq!(doc.tags["ALBUM"], "测试专辑");
        assert!(doc.timed_lyrics().contains("[00:12.34]第一行歌词"));
        assert_eq!(doc.pure_lyrics(), "第一行歌词\n第二行歌词");
    }

    #[test]
    fn test_empty_file_is_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.lrc");
        std::fs::write(&path, b"").unwrap();

        let doc = parse_lyrics_file(&path, &default_encodings()).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_big5_bytes() {
        // GBK accepts most Big5 byte sequences, so Big5 has to come first here
        let (bytes, _, _) = encoding_rs::BIG5.encode("[00:01.00]歌詞");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big5.lrc");
        std::fs::write(&path, &bytes).unwrap();

        let doc = parse_lyrics_file(&path, &[encoding_rs::UTF_8, encoding_rs::BIG5]).unwrap();
        assert_eq!(doc.pure_lyrics(), "歌詞");
    }

    #[test]
    fn test_unreadable_with_strict_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.lrc");
        std::fs::write(&path, [0xFF, 0xFE, 0xFD]).unwrap();

        let result = parse_lyrics_file(&path, &[encoding_rs::UTF_8]);
        assert!(matches!(result, Err(TextError::UnreadableText { .. })));
    }
}
