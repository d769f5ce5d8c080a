//! ffmpeg / ffprobe subprocess driver

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::{MediaTool, ToolError, ToolOutput};
use crate::features::settings::ToolSettings;

/// Installed ffmpeg, verified with `-version`
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    version: String,
}

impl FfmpegTool {
    /// Probe the configured ffmpeg binary once
    pub async fn detect(settings: &ToolSettings) -> Result<Self, ToolError> {
        let output = command(&settings.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| ToolError::from_spawn(&settings.ffmpeg_path, e))?;

        if !output.status.success() {
            return Err(ToolError::VersionCheck {
                program: settings.ffmpeg_path.clone(),
                code: output.status.code(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or_default().trim().to_string();
        tracing::debug!("Detected {}", version);

        Ok(Self {
            ffmpeg: settings.ffmpeg_path.clone(),
            ffprobe: settings.ffprobe_path.clone(),
            version,
        })
    }

    /// First line of `ffmpeg -version`
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl MediaTool for FfmpegTool {
    async fn run(&self, args: &[OsString]) -> Result<ToolOutput, ToolError> {
        tracing::debug!("Running {:?} {:?}", self.ffmpeg, args);

        let output = command(&self.ffmpeg)
            .args(args)
            .output()
            .await
            .map_err(|e| ToolError::from_spawn(&self.ffmpeg, e))?;

        Ok(ToolOutput {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn probe(&self, path: &Path) -> Result<String, ToolError> {
        let output = command(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .output()
            .await
            .map_err(|e| ToolError::from_spawn(&self.ffprobe, e))?;

        if !output.status.success() {
            return Err(ToolError::ProbeFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Non-interactive command with captured output
fn command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // CREATE_NO_WINDOW
    #[cfg(windows)]
    cmd.creation_flags(0x0800_0000);

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let settings = ToolSettings {
            ffmpeg_path: PathBuf::from("/nonexistent/tuneforge-test/ffmpeg"),
            ..ToolSettings::default()
        };
        let result = FfmpegTool::detect(&settings).await;
        assert!(matches!(result, Err(ToolError::NotFound { .. })));
    }
}
