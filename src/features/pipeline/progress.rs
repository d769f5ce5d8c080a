//! Job progress reporting

use std::path::PathBuf;
use tokio::sync::mpsc;

use super::stage::Stage;
use crate::utils::format_size;

/// Progress update sent while a job runs
#[derive(Debug, Clone, PartialEq)]
pub enum JobProgress {
    /// Job accepted and validated
    Started { input: PathBuf, output: PathBuf },
    /// A stage is about to run
    StageStarted(Stage),
    /// A stage was not needed for this job
    StageSkipped { stage: Stage, reason: String },
    /// A stage finished and its result is in place
    StageCompleted { stage: Stage, detail: Option<String> },
    /// Something optional went wrong; the job continues
    Warning(String),
    /// Job completed
    Finished { output: PathBuf, size: u64 },
    /// Job stopped at a stage
    Failed { stage: Stage, message: String },
}

impl JobProgress {
    /// One human-readable status line
    pub fn describe(&self) -> String {
        match self {
            JobProgress::Started { input, output } => {
                format!("Processing {} -> {}", input.display(), output.display())
            }
            JobProgress::StageStarted(stage) => format!("[{}] running...", stage),
            JobProgress::StageSkipped { stage, reason } => {
                format!("[{}] skipped: {}", stage, reason)
            }
            JobProgress::StageCompleted { stage, detail } => match detail {
                Some(detail) => format!("[{}] done ({})", stage, detail),
                None => format!("[{}] done", stage),
            },
            JobProgress::Warning(message) => format!("Warning: {}", message),
            JobProgress::Finished { output, size } => {
                format!("Finished: {} ({})", output.display(), format_size(*size))
            }
            JobProgress::Failed { stage, message } => {
                format!("[{}] failed: {}", stage, message)
            }
        }
    }
}

/// Progress sender for reporting job updates
pub type ProgressSender = mpsc::UnboundedSender<JobProgress>;
/// Progress receiver for receiving job updates
pub type ProgressReceiver = mpsc::UnboundedReceiver<JobProgress>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Send an update, ignoring a receiver that has gone away
pub(super) fn report(tx: &ProgressSender, update: JobProgress) {
    tracing::debug!("{:?}", update);
    let _ = tx.send(update);
}
