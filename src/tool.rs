//! External media tool
//!
//! Provides the `MediaTool` capability used by the pipeline and the
//! inspector. A real `FfmpegTool` can only be obtained through a successful
//! version probe, so holding one means the tool is installed.

mod ffmpeg;
#[cfg(test)]
pub mod fake;

pub use ffmpeg::FfmpegTool;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// The last `max_chars` characters of stderr, where the tool prints its
    /// actual error
    pub fn stderr_excerpt(&self, max_chars: usize) -> String {
        let trimmed = self.stderr.trim();
        let count = trimmed.chars().count();
        if count <= max_chars {
            return trimmed.to_string();
        }
        let tail: String = trimmed.chars().skip(count - max_chars).collect();
        format!("...{}", tail)
    }
}

/// Errors raised while launching the tool
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{} not found, install it or set its path in the settings file", .program.display())]
    NotFound { program: PathBuf },

    #[error("failed to launch {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} -version exited with code {code:?}", .program.display())]
    VersionCheck { program: PathBuf, code: Option<i32> },

    #[error("probe failed with exit code {code:?}: {stderr}")]
    ProbeFailed { code: Option<i32>, stderr: String },

    #[error("tool IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Map a spawn failure, separating "not installed" from other errors
    pub(crate) fn from_spawn(program: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ToolError::NotFound {
                program: program.to_path_buf(),
            }
        } else {
            ToolError::Spawn {
                program: program.to_path_buf(),
                source,
            }
        }
    }
}

/// Capability to run the media tool
///
/// Implementations run one process per call and return once it has exited.
#[allow(async_fn_in_trait)]
pub trait MediaTool {
    /// Run the converter with the given argument list
    async fn run(&self, args: &[OsString]) -> Result<ToolOutput, ToolError>;

    /// Return the probe tool's JSON description of a media file
    async fn probe(&self, path: &Path) -> Result<String, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_excerpt_keeps_tail() {
        let output = ToolOutput {
            code: Some(1),
            stderr: "line one\nline two\nError opening output\n".to_string(),
        };
        assert!(!output.success());
        assert_eq!(output.stderr_excerpt(5), "...utput");
        assert_eq!(
            output.stderr_excerpt(300),
            "line one\nline two\nError opening output"
        );
    }

    #[test]
    fn test_spawn_error_mapping() {
        let missing = ToolError::from_spawn(
            Path::new("ffmpeg"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(missing, ToolError::NotFound { .. }));

        let denied = ToolError::from_spawn(
            Path::new("ffmpeg"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(denied, ToolError::Spawn { .. }));
    }
}
