//! Encoding fallback for user-supplied text documents
//!
//! Lyric and metadata files found in the wild (especially Chinese songs from
//! the 2000s) are often saved as GBK or Big5 rather than UTF-8. Decoding tries
//! each configured encoding in order and keeps the first one that decodes the
//! whole file without a single malformed sequence.

use encoding_rs::Encoding;
use std::path::Path;
use thiserror::Error;

/// Default fallback order: UTF-8, GBK, GB2312, Big5, Latin-1
///
/// `encoding_rs` follows the WHATWG labels, so "gb2312" resolves to GBK and
/// "latin1" to windows-1252. Both are kept in the list for parity with the
/// labels users put in their settings.
pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "gbk", "gb2312", "big5", "latin1"];

/// Errors raised while turning raw bytes into text
#[derive(Debug, Error)]
pub enum TextError {
    /// None of the encodings in the fallback list decoded the input cleanly
    #[error("unreadable text: none of [{}] could decode the input", tried.join(", "))]
    UnreadableText { tried: Vec<String> },

    /// The file could not be read at all
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve encoding labels to `encoding_rs` encodings, skipping unknown labels
pub fn resolve_encodings<S: AsRef<str>>(labels: &[S]) -> Vec<&'static Encoding> {
    let mut resolved = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.as_ref();
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) => resolved.push(encoding),
            None => tracing::warn!("Unknown text encoding label {:?}, skipping", label),
        }
    }
    resolved
}

/// The built-in fallback chain
pub fn default_encodings() -> Vec<&'static Encoding> {
    resolve_encodings(DEFAULT_ENCODINGS)
}

/// Decode bytes with the first encoding that succeeds without errors
///
/// A UTF-8 byte order mark is dropped. Empty input decodes to an empty string
/// with the first encoding.
pub fn decode_with_fallback(
    bytes: &[u8],
    encodings: &[&'static Encoding],
) -> Result<String, TextError> {
    for encoding in encodings {
        if let Some(decoded) = encoding.decode_without_bom_handling_and_without_replacement(bytes)
        {
            let text = decoded.strip_prefix('\u{FEFF}').unwrap_or(&decoded);
            tracing::debug!("Decoded {} bytes as {}", bytes.len(), encoding.name());
            return Ok(text.to_string());
        }
    }

    Err(TextError::UnreadableText {
        tried: encodings.iter().map(|e| e.name().to_string()).collect(),
    })
}

/// Read a file and decode it with the fallback chain
pub fn read_text_file(path: &Path, encodings: &[&'static Encoding]) -> Result<String, TextError> {
    let bytes = std::fs::read(path).map_err(|source| TextError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode_with_fallback(&bytes, encodings)
}
