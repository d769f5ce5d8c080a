//! In-process stand-in for ffmpeg used by tests

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{MediaTool, ToolError, ToolOutput};

/// Records every invocation and copies its first `-i` input to the last
/// argument, the way a stream-copy run would
#[derive(Debug, Default)]
pub struct FakeTool {
    calls: Mutex<Vec<Vec<OsString>>>,
    fail_on: Option<usize>,
    probe_json: String,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the n-th invocation (zero-based) exit with code 1
    pub fn failing_at(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::default()
        }
    }

    pub fn with_probe_output(json: &str) -> Self {
        Self {
            probe_json: json.to_string(),
            ..Self::default()
        }
    }

    /// Recorded argument lists
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|args| args.iter().map(|a| a.to_string_lossy().into_owned()).collect())
            .collect()
    }
}

impl MediaTool for FakeTool {
    async fn run(&self, args: &[OsString]) -> Result<ToolOutput, ToolError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(args.to_vec());
            calls.len() - 1
        };

        if self.fail_on == Some(index) {
            return Ok(ToolOutput {
                code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }

        let input = args
            .windows(2)
            .find(|pair| pair[0] == "-i")
            .map(|pair| PathBuf::from(&pair[1]));
        if let (Some(input), Some(output)) = (input, args.last()) {
            std::fs::copy(input, output)?;
        }

        Ok(ToolOutput {
            code: Some(0),
            stderr: String::new(),
        })
    }

    async fn probe(&self, _path: &Path) -> Result<String, ToolError> {
        Ok(self.probe_json.clone())
    }
}
