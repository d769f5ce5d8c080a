//! Conversion pipeline
//!
//! Runs one `MediaJob` through the media tool:
//! - `Validate`: job values and input file
//! - `TrimEncode`: trim and encode to FLAC, or `CopyInput` for the tag-only
//!   fast path (FLAC input, no trim, lyrics or metadata requested)
//! - `EmbedLyrics`: LYRICS tag plus lyric header tags
//! - `EmbedMetadata`: descriptive tags and an attached cover picture
//! - `Finalize`: report the finished file
//!
//! Every stage writes its own temp file next to the output and swaps it in
//! when the tool succeeds. A failed stage does not roll back earlier ones:
//! the output path keeps the last good result and the error says which stage
//! stopped the job.

mod job;
mod progress;
mod replace;
mod stage;

pub use job::{MAX_COMPRESSION_LEVEL, MediaJob, default_output_path, ensure_flac_extension};
pub use progress::{JobProgress, ProgressSender, progress_channel};
pub use stage::Stage;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::features::media::CoverNormalizer;
use crate::features::settings::Settings;
use crate::tool::{MediaTool, ToolError};
use crate::utils::stage_temp_path;
use progress::report;

/// Errors raised by the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("another job is already running")]
    Busy,

    #[error("encoding failed (exit code {code:?}): {stderr}")]
    EncodeFailed { code: Option<i32>, stderr: String },

    #[error("writing tags failed in {stage} (exit code {code:?}): {stderr}")]
    TagWriteFailed {
        stage: Stage,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{} is locked, gave up after {} ms", .path.display(), .waited.as_millis())]
    FileLocked { path: PathBuf, waited: Duration },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        /// Last good artifact left at the output path, if any
        partial: Option<PathBuf>,
        #[source]
        source: Box<PipelineError>,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// The stage that stopped the job, if it got that far
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Allows at most one job in flight
#[derive(Debug, Clone, Default)]
pub struct JobSlot(Arc<AtomicBool>);

/// Holds the slot until dropped
#[derive(Debug)]
pub struct JobGuard(Arc<AtomicBool>);

impl JobSlot {
    pub fn try_acquire(&self) -> Option<JobGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobGuard(self.0.clone()))
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Summary of a finished job
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub output: PathBuf,
    pub size: u64,
    /// Stages that ran, in order
    pub stages: Vec<Stage>,
    pub lyrics_truncated: bool,
    pub cover_embedded: bool,
}

/// Drives jobs through the media tool
pub struct Pipeline<T> {
    tool: T,
    covers: CoverNormalizer,
    settings: Settings,
    slot: JobSlot,
}

/// Running state of one job
struct Run<'a> {
    job: &'a MediaJob,
    progress: &'a ProgressSender,
    report: JobReport,
    /// Set once the output path holds a stage result
    partial: Option<PathBuf>,
}

impl<'a> Run<'a> {
    fn started(&self, stage: Stage) {
        report(self.progress, JobProgress::StageStarted(stage));
    }

    fn skipped(&self, stage: Stage, reason: &str) {
        report(
            self.progress,
            JobProgress::StageSkipped {
                stage,
                reason: reason.to_string(),
            },
        );
    }

    fn completed(&mut self, stage: Stage, detail: Option<String>) {
        self.report.stages.push(stage);
        if stage != Stage::Validate {
            self.partial = Some(self.job.output.clone());
        }
        report(self.progress, JobProgress::StageCompleted { stage, detail });
    }

    fn warn(&self, message: String) {
        tracing::warn!("{}", message);
        report(self.progress, JobProgress::Warning(message));
    }

    fn fail(&self, stage: Stage, error: PipelineError) -> PipelineError {
        tracing::error!("{} stage failed: {}", stage, error);
        report(
            self.progress,
            JobProgress::Failed {
                stage,
                message: error.to_string(),
            },
        );
        PipelineError::Stage {
            stage,
            partial: self.partial.clone(),
            source: Box::new(error),
        }
    }
}

impl<T: MediaTool> Pipeline<T> {
    pub fn new(tool: T, covers: CoverNormalizer, settings: Settings) -> Self {
        Self {
            tool,
            covers,
            settings,
            slot: JobSlot::default(),
        }
    }

    #[cfg(test)]
    pub fn tool(&self) -> &T {
        &self.tool
    }

    #[cfg(test)]
    pub fn slot(&self) -> &JobSlot {
        &self.slot
    }

    /// Run a job to completion
    ///
    /// Stages run strictly in order and each awaits its tool call before the
    /// next starts. Returns `Busy` without doing anything when another job
    /// holds the slot.
    pub async fn run(
        &self,
        job: &MediaJob,
        progress: &ProgressSender,
    ) -> Result<JobReport, PipelineError> {
        let _guard = self.slot.try_acquire().ok_or(PipelineError::Busy)?;

        let mut run = Run {
            job,
            progress,
            report: JobReport {
                output: job.output.clone(),
                size: 0,
                stages: Vec::new(),
                lyrics_truncated: false,
                cover_embedded: false,
            },
            partial: None,
        };

        run.started(Stage::Validate);
        job.validate().map_err(|e| run.fail(Stage::Validate, e))?;
        report(
            progress,
            JobProgress::Started {
                input: job.input.clone(),
                output: job.output.clone(),
            },
        );
        run.completed(Stage::Validate, None);

        if job.is_tag_only() {
            run.skipped(Stage::TrimEncode, "input is already FLAC and no trim was requested");
            self.copy_input(&mut run).await?;
        } else {
            self.trim_encode(&mut run).await?;
        }

        self.embed_lyrics(&mut run).await?;
        self.embed_metadata(&mut run).await?;

        run.started(Stage::Finalize);
        let size = tokio::fs::metadata(&job.output)
            .await
            .map_err(|e| run.fail(Stage::Finalize, e.into()))?
            .len();
        run.report.size = size;
        run.completed(Stage::Finalize, None);
        report(
            progress,
            JobProgress::Finished {
                output: job.output.clone(),
                size,
            },
        );

        Ok(run.report)
    }

    async fn copy_input(&self, run: &mut Run<'_>) -> Result<(), PipelineError> {
        let stage = Stage::CopyInput;
        run.started(stage);
        let temp = stage_temp_path(&run.job.output, stage.slug());
        replace::copy_into_place(&run.job.input, &temp, &run.job.output, &self.settings.replace)
            .await
            .map_err(|e| run.fail(stage, e))?;
        run.completed(stage, None);
        Ok(())
    }

    async fn trim_encode(&self, run: &mut Run<'_>) -> Result<(), PipelineError> {
        let stage = Stage::TrimEncode;
        let job = run.job;
        run.started(stage);

        let temp = stage_temp_path(&job.output, stage.slug());
        let args = stage::encode_args(
            &job.input,
            &temp,
            job.start,
            job.duration,
            job.compression_level,
            &self.settings.encode,
        );
        self.run_stage(stage, args, &temp, &job.output)
            .await
            .map_err(|e| run.fail(stage, e))?;

        let detail = format!("compression level {}", job.compression_level);
        run.completed(stage, Some(detail));
        Ok(())
    }

    async fn embed_lyrics(&self, run: &mut Run<'_>) -> Result<(), PipelineError> {
        let stage = Stage::EmbedLyrics;
        let job = run.job;
        let Some(document) = &job.lyrics else {
            run.skipped(stage, "no lyric file");
            return Ok(());
        };

        run.started(stage);
        if !document.has_lyrics() {
            run.warn("no timed lyric lines found, nothing embedded".to_string());
            run.completed(stage, Some("no lyrics".to_string()));
            return Ok(());
        }

        let output = &job.output;
        let temp = stage_temp_path(output, stage.slug());
        let (args, truncated) = stage::lyrics_args(output, &temp, document, &self.settings.lyrics);
        if truncated {
            run.warn(format!(
                "lyrics are longer than {} characters and were truncated",
                self.settings.lyrics.max_length
            ));
        }

        self.run_stage(stage, args, &temp, output)
            .await
            .map_err(|e| run.fail(stage, e))?;

        run.report.lyrics_truncated = truncated;
        let detail = format!("{} timed lines", document.timed_lines().len());
        run.completed(stage, Some(detail));
        Ok(())
    }

    async fn embed_metadata(&self, run: &mut Run<'_>) -> Result<(), PipelineError> {
        let stage = Stage::EmbedMetadata;
        let job = run.job;
        let Some(record) = &job.metadata else {
            run.skipped(stage, "no metadata file");
            return Ok(());
        };
        if record.is_empty() {
            run.skipped(stage, "metadata file has no tags");
            return Ok(());
        }

        run.started(stage);
        let cover = match &record.cover {
            Some(spec) => match self.covers.normalize(spec).await {
                Ok(cover) => Some(cover),
                Err(e) => {
                    run.warn(format!("cover {} not embedded: {}", spec.describe(), e));
                    None
                }
            },
            None => None,
        };

        let output = &job.output;
        let temp = stage_temp_path(output, stage.slug());
        let args = stage::metadata_args(
            output,
            &temp,
            &record.tags,
            cover.as_ref().map(|c| c.path.as_path()),
        );
        let result = self.run_stage(stage, args, &temp, output).await;
        if let Some(cover) = &cover {
            cover.remove_temporary();
        }
        result.map_err(|e| run.fail(stage, e))?;

        run.report.cover_embedded = cover.is_some();
        let detail = match cover {
            Some(_) => format!("{} tags and cover", record.tags.len()),
            None => format!("{} tags", record.tags.len()),
        };
        run.completed(stage, Some(detail));
        Ok(())
    }

    /// Run the tool into `temp`, then swap `temp` into `dest`
    async fn run_stage(
        &self,
        stage: Stage,
        args: Vec<OsString>,
        temp: &Path,
        dest: &Path,
    ) -> Result<(), PipelineError> {
        let output = match self.tool.run(&args).await {
            Ok(output) => output,
            Err(e) => {
                replace::discard(temp).await;
                return Err(e.into());
            }
        };

        if !output.success() {
            replace::discard(temp).await;
            let stderr = output.stderr_excerpt(self.settings.tool.stderr_excerpt_chars);
            return Err(match stage {
                Stage::TrimEncode => PipelineError::EncodeFailed {
                    code: output.code,
                    stderr,
                },
                _ => PipelineError::TagWriteFailed {
                    stage,
                    code: output.code,
                    stderr,
                },
            });
        }

        if let Err(e) = replace::replace_file(temp, dest, &self.settings.replace).await {
            replace::discard(temp).await;
            return Err(e);
        }
        Ok(())
    }
}
