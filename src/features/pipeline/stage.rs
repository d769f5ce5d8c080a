//! Pipeline stages and the tool argument lists they run

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use crate::features::lyrics::LyricDocument;
use crate::features::settings::{EncodeSettings, LyricsSettings};

/// Steps of a job, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    TrimEncode,
    /// Tag-only fast path: the input is copied instead of re-encoded
    CopyInput,
    EmbedLyrics,
    EmbedMetadata,
    Finalize,
}

impl Stage {
    /// Short name used in temp file names
    pub fn slug(self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::TrimEncode => "encode",
            Stage::CopyInput => "copy",
            Stage::EmbedLyrics => "lyrics",
            Stage::EmbedMetadata => "metadata",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::TrimEncode => "trim/encode",
            Stage::CopyInput => "copy",
            Stage::EmbedLyrics => "embed lyrics",
            Stage::EmbedMetadata => "embed metadata",
            Stage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Collects an argument list for the media tool
#[derive(Debug, Default)]
struct Args(Vec<OsString>);

impl Args {
    fn flag(mut self, flag: &str) -> Self {
        self.0.push(flag.into());
        self
    }

    fn pair(mut self, flag: &str, value: impl Into<OsString>) -> Self {
        self.0.push(flag.into());
        self.0.push(value.into());
        self
    }

    fn input(self, path: &Path) -> Self {
        self.pair("-i", path.as_os_str())
    }

    fn tag(self, key: &str, value: &str) -> Self {
        self.pair("-metadata", format!("{}={}", key, value))
    }

    /// Overwrite `path`; always the last argument
    fn output(self, path: &Path) -> Vec<OsString> {
        let mut args = self.flag("-y").0;
        args.push(path.as_os_str().to_os_string());
        args
    }
}

/// Trim (optional) and encode to 16-bit stereo FLAC
pub fn encode_args(
    input: &Path,
    output: &Path,
    start: Option<f64>,
    duration: Option<f64>,
    compression_level: u8,
    encode: &EncodeSettings,
) -> Vec<OsString> {
    let mut args = Args::default().input(input);
    if let Some(start) = start {
        args = args.pair("-ss", start.to_string());
    }
    if let Some(duration) = duration {
        args = args.pair("-t", duration.to_string());
    }
    args.flag("-vn")
        .pair("-acodec", "flac")
        .pair("-compression_level", compression_level.to_string())
        .pair("-ar", encode.sample_rate.to_string())
        .pair("-ac", encode.channels.to_string())
        .pair("-sample_fmt", encode.sample_format.as_str())
        .pair("-avoid_negative_ts", "1")
        .output(output)
}

/// Limit lyric text to `max_chars` characters
///
/// Text at or under the limit is returned unchanged; longer text is cut and a
/// marker with the original length is appended. Returns whether it was cut.
pub fn truncate_lyrics(text: &str, max_chars: usize) -> (String, bool) {
    let length = text.chars().count();
    if length <= max_chars {
        return (text.to_string(), false);
    }

    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str(&format!(
        "\n...(lyrics truncated from {} to {} characters)",
        length, max_chars
    ));
    (cut, true)
}

/// Stream-copy with the LYRICS tag and the lyric header tags
///
/// Header tags whose value is not shorter than the configured limit are left
/// out. Returns the arguments and whether the lyrics were truncated.
pub fn lyrics_args(
    input: &Path,
    output: &Path,
    document: &LyricDocument,
    limits: &LyricsSettings,
) -> (Vec<OsString>, bool) {
    let (lyrics, truncated) = truncate_lyrics(&document.timed_lyrics(), limits.max_length);

    let mut args = Args::default()
        .input(input)
        .pair("-c", "copy")
        .tag("LYRICS", &lyrics);

    for (key, value) in &document.tags {
        if value.is_empty() || value.chars().count() >= limits.max_tag_value_chars {
            tracing::debug!("Not writing lyric tag {} ({} chars)", key, value.chars().count());
            continue;
        }
        args = args.tag(key, value);
    }

    (args.output(output), truncated)
}

/// Stream-copy with descriptive tags and an optional attached picture
pub fn metadata_args(
    input: &Path,
    output: &Path,
    tags: &BTreeMap<String, String>,
    cover: Option<&Path>,
) -> Vec<OsString> {
    let mut args = Args::default().input(input);
    if let Some(cover) = cover {
        args = args.input(cover);
    }
    args = args.pair("-c", "copy");

    for (key, value) in tags.iter().filter(|(_, v)| !v.is_empty()) {
        args = args.tag(key, value);
    }

    if cover.is_some() {
        args = args
            .pair("-map", "0:a")
            .pair("-map", "1:v")
            .pair("-disposition:v", "attached_pic");
    }

    args.output(output)
}
