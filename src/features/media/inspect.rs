//! Tag and stream report for finished files
//!
//! Reads the probe tool's JSON description of a file and renders the
//! technical info, attached pictures and tags as plain text.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::features::lyrics::has_timestamp;
use crate::tool::{MediaTool, ToolError};
use crate::utils::{format_duration, format_size};

/// Tags that carry picture data rather than text
pub const PICTURE_TAGS: &[&str] = &["METADATA_BLOCK_PICTURE", "COVERART", "COVERARTURL", "ARTWORK"];

/// Shown first, in this order
const PRIORITY_TAGS: &[&str] = &["TITLE", "ARTIST", "ALBUM", "DATE", "GENRE", "TRACK", "COMPOSER"];

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("unreadable probe output: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    channel_layout: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// Audio stream summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioStreamInfo {
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
}

/// Picture stream (attached cover)
#[derive(Debug, Clone, PartialEq)]
pub struct PictureInfo {
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub pix_fmt: Option<String>,
}

/// Everything the report shows about one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub format_name: Option<String>,
    pub duration_secs: Option<f64>,
    pub size: Option<u64>,
    pub bit_rate: Option<u64>,
    pub audio: Option<AudioStreamInfo>,
    pub pictures: Vec<PictureInfo>,
    /// Container tags overlaid with the first stream's tags, keys uppercased
    pub tags: BTreeMap<String, String>,
}

impl MediaInfo {
    /// Build from `ffprobe -print_format json -show_streams -show_format`
    pub fn from_probe_json(path: &Path, json: &str) -> Result<Self, InspectError> {
        let probe: ProbeOutput = serde_json::from_str(json)?;

        let mut tags = BTreeMap::new();
        let first_stream_tags = probe.streams.first().map(|s| &s.tags);
        for (key, value) in probe.format.tags.iter().chain(first_stream_tags.into_iter().flatten()) {
            tags.insert(key.to_uppercase(), value.clone());
        }

        let audio = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"))
            .map(|s| AudioStreamInfo {
                codec: s.codec_name.clone(),
                sample_rate: s.sample_rate.as_deref().and_then(|r| r.parse().ok()),
                channels: s.channels,
                channel_layout: s.channel_layout.clone(),
            });

        let pictures = probe
            .streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some("video"))
            .map(|s| PictureInfo {
                codec: s.codec_name.clone(),
                width: s.width,
                height: s.height,
                pix_fmt: s.pix_fmt.clone(),
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            format_name: probe.format.format_name,
            duration_secs: probe.format.duration.and_then(|d| d.parse().ok()),
            size: probe.format.size.and_then(|s| s.parse().ok()),
            bit_rate: probe.format.bit_rate.and_then(|b| b.parse().ok()),
            audio,
            pictures,
            tags,
        })
    }

    /// Picture-bearing tags present in the file
    pub fn picture_tags(&self) -> Vec<&'static str> {
        PICTURE_TAGS
            .iter()
            .copied()
            .filter(|tag| self.tags.contains_key(*tag))
            .collect()
    }

    pub fn has_cover(&self) -> bool {
        !self.pictures.is_empty() || !self.picture_tags().is_empty()
    }
}

/// Probe a file with the media tool
pub async fn inspect<T: MediaTool>(tool: &T, path: &Path) -> Result<MediaInfo, InspectError> {
    if !path.exists() {
        return Err(InspectError::NotFound(path.to_path_buf()));
    }
    let json = tool.probe(path).await?;
    MediaInfo::from_probe_json(path, &json)
}

fn or_unknown<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Render a plain-text report
pub fn render_report(info: &MediaInfo) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let name = info
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "File: {}", name);
    let _ = writeln!(out, "Path: {}", info.path.display());
    let _ = writeln!(out, "{}\n", rule);

    let _ = writeln!(out, "[File]");
    let _ = writeln!(out, "  Format: {}", or_unknown(&info.format_name));
    let _ = writeln!(out, "  Size: {}", or_unknown(&info.size.map(format_size)));
    let _ = writeln!(out, "  Duration: {}", or_unknown(&info.duration_secs.map(format_duration)));
    let _ = writeln!(out, "  Bit rate: {} bps\n", or_unknown(&info.bit_rate));

    let audio = info.audio.clone().unwrap_or_default();
    let _ = writeln!(out, "[Audio stream]");
    let _ = writeln!(out, "  Codec: {}", or_unknown(&audio.codec));
    let _ = writeln!(out, "  Sample rate: {} Hz", or_unknown(&audio.sample_rate));
    let _ = writeln!(out, "  Channels: {}", or_unknown(&audio.channels));
    let _ = writeln!(out, "  Layout: {}\n", or_unknown(&audio.channel_layout));

    let _ = writeln!(out, "[Cover]");
    if !info.has_cover() {
        let _ = writeln!(out, "  No cover");
    }
    for picture in &info.pictures {
        let _ = writeln!(out, "  Picture stream: {}", or_unknown(&picture.codec));
        let _ = writeln!(
            out,
            "  Size: {} x {} px",
            or_unknown(&picture.width),
            or_unknown(&picture.height)
        );
        let _ = writeln!(out, "  Pixel format: {}", or_unknown(&picture.pix_fmt));
    }
    let picture_tags = info.picture_tags();
    if !picture_tags.is_empty() {
        let _ = writeln!(out, "  Picture tags: {}", picture_tags.join(", "));
        if let Some(url) = info.tags.get("COVERARTURL") {
            let _ = writeln!(out, "  Cover URL: {}", url);
        }
    }
    out.push('\n');

    let text_tags: Vec<(&String, &String)> = info
        .tags
        .iter()
        .filter(|(k, _)| !PICTURE_TAGS.contains(&k.as_str()))
        .collect();
    if !text_tags.is_empty() {
        let _ = writeln!(out, "[Tags]");
        let priority = PRIORITY_TAGS
            .iter()
            .filter_map(|p| text_tags.iter().find(|(k, _)| k.as_str() == *p));
        let rest = text_tags
            .iter()
            .filter(|(k, _)| !PRIORITY_TAGS.contains(&k.as_str()));
        for (key, value) in priority.chain(rest) {
            render_tag(&mut out, key, value);
        }
    }

    if let Some(lyrics) = info.tags.get("LYRICS") {
        let timed = lyrics.lines().any(has_timestamp);
        let _ = writeln!(
            out,
            "\nLyrics: {}",
            if timed { "timed (LRC timestamps)" } else { "plain text" }
        );
    }

    out
}

fn render_tag(out: &mut String, key: &str, value: &str) {
    let lines: Vec<&str> = value.lines().collect();
    if key == "LYRICS" {
        let _ = writeln!(out, "  {}:", key);
        for line in lines.iter().take(5) {
            let _ = writeln!(out, "    {}", line);
        }
        let length = value.chars().count();
        if length > 200 {
            let _ = writeln!(out, "    ...({} characters in total)", length);
        }
    } else if lines.len() > 1 {
        let _ = writeln!(out, "  {}:", key);
        for line in lines.iter().take(3) {
            let _ = writeln!(out, "    {}", line);
        }
        if lines.len() > 3 {
            let _ = writeln!(out, "    ...({} lines)", lines.len());
        }
    } else {
        let _ = writeln!(out, "  {}: {}", key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::fake::FakeTool;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "flac",
                "codec_type": "audio",
                "sample_rate": "44100",
                "channels": 2,
                "channel_layout": "stereo",
                "tags": { "lyrics": "[00:01.00]hello\n[00:02.00]world" }
            },
            {
                "index": 1,
                "codec_name": "mjpeg",
                "codec_type": "video",
                "width": 500,
                "height": 500,
                "pix_fmt": "yuvj420p"
            }
        ],
        "format": {
            "format_name": "flac",
            "duration": "185.250000",
            "size": "3145728",
            "bit_rate": "135848",
            "tags": { "TITLE": "Song", "ARTIST": "Someone", "COMMENT": "a\nb\nc\nd" }
        }
    }"#;

    #[test]
    fn test_from_probe_json() {
        let info = MediaInfo::from_probe_json(Path::new("/m/song.flac"), PROBE_JSON).unwrap();
        assert_eq!(info.format_name.as_deref(), Some("flac"));
        assert_eq!(info.duration_secs, Some(185.25));
        assert_eq!(info.size, Some(3_145_728));
        assert_eq!(info.audio.as_ref().unwrap().sample_rate, Some(44100));
        assert_eq!(info.pictures.len(), 1);
        assert_eq!(info.tags["TITLE"], "Song");
        assert!(info.tags["LYRICS"].starts_with("[00:01.00]"));
        assert!(info.has_cover());
        assert!(info.picture_tags().is_empty());
    }

    #[test]
    fn test_render_report() {
        let info = MediaInfo::from_probe_json(Path::new("/m/song.flac"), PROBE_JSON).unwrap();
        let report = render_report(&info);

        assert!(report.contains("File: song.flac"));
        assert!(report.contains("Size: 3.00 MB"));
        assert!(report.contains("Duration: 03:05.250"));
        assert!(report.contains("Size: 500 x 500 px"));
        assert!(report.contains("Lyrics: timed"));
        assert!(report.contains("    ...(4 lines)"));

        // Priority tags come before the rest
        let title = report.find("TITLE: Song").unwrap();
        let artist = report.find("ARTIST: Someone").unwrap();
        let comment = report.find("COMMENT:").unwrap();
        assert!(title < artist && artist < comment);
    }

    #[test]
    fn test_minimal_probe_output() {
        let info = MediaInfo::from_probe_json(Path::new("x.flac"), "{}").unwrap();
        assert!(info.audio.is_none());
        assert!(!info.has_cover());
        let report = render_report(&info);
        assert!(report.contains("Format: unknown"));
        assert!(report.contains("[Cover]\n  No cover\n"));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            MediaInfo::from_probe_json(Path::new("x.flac"), "not json"),
            Err(InspectError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_inspect_with_tool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.flac");
        std::fs::write(&path, b"audio").unwrap();

        let tool = FakeTool::with_probe_output(PROBE_JSON);
        let info = inspect(&tool, &path).await.unwrap();
        assert_eq!(info.path, path);

        let missing = inspect(&tool, &dir.path().join("none.flac")).await;
        assert!(matches!(missing, Err(InspectError::NotFound(_))));
    }
}
