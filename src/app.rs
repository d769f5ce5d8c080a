//! Command execution
//!
//! Turns a parsed command line into work: probes the media tool, loads the
//! lyric and metadata files, runs the pipeline on a background task and
//! prints its progress.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;

use crate::cli::{Command, ConvertArgs, USAGE};
use crate::features::Settings;
use crate::features::import::{parse_metadata_file, read_text_file, resolve_encodings};
use crate::features::lyrics::{parse_lyrics_file, shift_lyrics, shifted_file_path};
use crate::features::media::{CoverNormalizer, inspect, render_report};
use crate::features::pipeline::{MediaJob, Pipeline, PipelineError, progress_channel};
use crate::tool::FfmpegTool;
use crate::utils::format_time;

/// Exit code when the media tool is missing
const EXIT_MISSING_TOOL: u8 = 2;

pub struct App {
    settings: Settings,
    encodings: Vec<&'static Encoding>,
}

impl App {
    /// Load settings from `config`, or the default location
    pub fn new(config: Option<&Path>) -> Self {
        let settings = match config {
            Some(path) => Settings::load_or_default(path),
            None => Settings::load(),
        };

        let mut encodings = resolve_encodings(&settings.text.encodings);
        if encodings.is_empty() {
            tracing::warn!("No usable text encodings configured, using defaults");
            encodings = crate::features::import::encoding::default_encodings();
        }

        Self {
            settings,
            encodings,
        }
    }

    pub async fn run(&self, command: Command) -> ExitCode {
        match command {
            Command::Help => {
                print!("{}", USAGE);
                ExitCode::SUCCESS
            }
            Command::ShiftLyrics { path, offset } => exit_code(self.shift_lyrics(&path, offset)),
            Command::Inspect(paths) => {
                let Some(tool) = self.detect_tool().await else {
                    return ExitCode::from(EXIT_MISSING_TOOL);
                };
                let mut ok = true;
                for path in &paths {
                    match inspect(&tool, path).await {
                        Ok(info) => println!("{}", render_report(&info)),
                        Err(e) => {
                            eprintln!("Error: {}: {}", path.display(), e);
                            ok = false;
                        }
                    }
                }
                if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
            }
            Command::Convert(args) => {
                let Some(tool) = self.detect_tool().await else {
                    return ExitCode::from(EXIT_MISSING_TOOL);
                };
                exit_code(self.convert(tool, args).await)
            }
        }
    }

    async fn detect_tool(&self) -> Option<FfmpegTool> {
        match FfmpegTool::detect(&self.settings.tool).await {
            Ok(tool) => {
                tracing::info!("Using {}", tool.version());
                Some(tool)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Download: https://ffmpeg.org/download.html");
                None
            }
        }
    }

    async fn convert(&self, tool: FfmpegTool, args: ConvertArgs) -> Result<()> {
        let output = args.output_path();
        let compression_level = args
            .compression_level
            .unwrap_or(self.settings.encode.compression_level);
        let mut job = MediaJob::new(&args.input, &output, compression_level)
            .with_trim(args.start, args.duration);

        println!("Input:    {}", args.input.display());
        println!("Output:   {}", output.display());
        if let Some(start) = args.start {
            println!("Start:    {}", format_time(start));
        }
        if let Some(duration) = args.duration {
            println!("Duration: {}", format_time(duration));
        }
        println!("Format:   FLAC (compression level {})", compression_level);

        if let Some(path) = &args.lyrics {
            if !path.exists() {
                bail!("lyric file {} does not exist", path.display());
            }
            let document = parse_lyrics_file(path, &self.encodings)
                .with_context(|| format!("reading lyric file {}", path.display()))?;
            println!(
                "Lyrics:   {} ({} timed lines)",
                path.display(),
                document.timed_lines().len()
            );
            job = job.with_lyrics(document);
        }

        if let Some(path) = &args.metadata {
            if !path.exists() {
                bail!("metadata file {} does not exist", path.display());
            }
            let record = parse_metadata_file(path, &self.encodings)
                .with_context(|| format!("reading metadata file {}", path.display()))?;
            println!(
                "Metadata: {} ({} tags{})",
                path.display(),
                record.tags.len(),
                if record.cover.is_some() { ", cover" } else { "" }
            );
            job = job.with_metadata(record);
        }
        println!();

        let covers = CoverNormalizer::new(self.settings.cover.clone())?;
        let pipeline = Arc::new(Pipeline::new(tool, covers, self.settings.clone()));

        let (tx, mut rx) = progress_channel();
        let worker = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.run(&job, &tx).await })
        };

        while let Some(update) = rx.recv().await {
            println!("{}", update.describe());
        }

        match worker.await.context("job task stopped unexpectedly")? {
            Ok(_) => Ok(()),
            Err(e) => {
                if let (Some(stage), PipelineError::Stage {
                    partial: Some(partial),
                    ..
                }) = (e.stage(), &e)
                {
                    println!(
                        "Output before the {} stage left at {}",
                        stage,
                        partial.display()
                    );
                }
                Err(e.into())
            }
        }
    }

    fn shift_lyrics(&self, path: &Path, offset: f64) -> Result<()> {
        if !path.exists() {
            bail!("lyric file {} does not exist", path.display());
        }
        let content = read_text_file(path, &self.encodings)
            .with_context(|| format!("reading lyric file {}", path.display()))?;

        let shifted = shift_lyrics(&content, offset);
        let target = shifted_file_path(path, offset);
        std::fs::write(&target, shifted)
            .with_context(|| format!("writing {}", target.display()))?;

        println!("Shifted lyrics by {}s: {}", offset, target.display());
        Ok(())
    }
}

fn exit_code(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_with_defaults(dir: &Path) -> App {
        App::new(Some(&dir.join("settings.json")))
    }

    #[test]
    fn test_new_falls_back_to_default_encodings() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("settings.json");
        std::fs::write(&config, r#"{"text": {"encodings": ["no-such-charset"]}}"#).unwrap();

        let app = App::new(Some(&config));
        assert_eq!(app.encodings[0], encoding_rs::UTF_8);
        assert!(app.encodings.len() > 1);
    }

    #[test]
    fn test_shift_lyrics_writes_sibling_file() {
        let dir = tempfile::tempdir().unwrap();
        let lrc = dir.path().join("song.lrc");
        std::fs::write(&lrc, "[ti:Song]\n[00:10.00]line").unwrap();

        app_with_defaults(dir.path()).shift_lyrics(&lrc, -7.0).unwrap();
        let shifted = std::fs::read_to_string(dir.path().join("song-7.0s.lrc")).unwrap();
        assert_eq!(shifted, "[ti:Song]\n[00:03.00]line\n");
    }

    #[test]
    fn test_shift_lyrics_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = app_with_defaults(dir.path()).shift_lyrics(&dir.path().join("x.lrc"), 1.0);
        assert!(result.is_err());
    }
}
