//! Application settings persistence
//!
//! Handles saving and loading tool paths, encoding parameters and the
//! limits applied while embedding lyrics and covers.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::import::DEFAULT_ENCODINGS;

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// External media tool
    pub tool: ToolSettings,
    /// FLAC encoding parameters
    pub encode: EncodeSettings,
    /// Text decoding for lyric and metadata files
    pub text: TextSettings,
    /// Lyric embedding limits
    pub lyrics: LyricsSettings,
    /// Cover download and conversion
    pub cover: CoverSettings,
    /// Output file replacement
    pub replace: ReplaceSettings,
}

/// Paths of the ffmpeg/ffprobe executables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// How much of the tool's stderr is kept in error reports
    pub stderr_excerpt_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    /// FLAC compression level (0-8), used when `-c` is not given
    pub compression_level: u8,
    pub sample_rate: u32,
    pub channels: u8,
    pub sample_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    /// Encoding labels tried in order
    pub encodings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsSettings {
    /// Longest LYRICS tag value before truncation, in characters
    pub max_length: usize,
    /// Lyric header tags at or above this length are not written
    pub max_tag_value_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverSettings {
    pub jpeg_quality: u8,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub referer: String,
}

/// Backoff used when swapping a finished stage into place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaceSettings {
    pub initial_delay_ms: u64,
    pub max_wait_ms: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            stderr_excerpt_chars: 300,
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            compression_level: 5,
            sample_rate: 44100,
            channels: 2,
            sample_format: "s16".to_string(),
        }
    }
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            encodings: DEFAULT_ENCODINGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for LyricsSettings {
    fn default() -> Self {
        Self {
            max_length: 2000,
            max_tag_value_chars: 100,
        }
    }
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 95,
            http_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            referer: "https://www.bilibili.com/".to_string(),
        }
    }
}

impl Default for ReplaceSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 200,
            max_wait_ms: 5000,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tuneforge", "Tuneforge")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return defaults if not found
    pub fn load() -> Self {
        Self::file_path()
            .map(|path| Self::load_or_default(&path))
            .unwrap_or_default()
    }

    /// Load settings from a specific file, falling back to defaults
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring settings file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Errors that can occur with settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
