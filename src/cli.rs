//! Command line parsing
//!
//! Flags follow ffmpeg's single-dash style (`-ss`, `-t`, `-metadata`), so the
//! argument list is scanned by hand. Unknown options are collected as
//! warnings instead of aborting.

use std::path::PathBuf;

use thiserror::Error;

use crate::features::pipeline::{
    MAX_COMPRESSION_LEVEL, default_output_path, ensure_flac_extension,
};
use crate::utils::parse_time;

pub const USAGE: &str = "\
tuneforge - convert media to FLAC with lyrics, tags and cover art

USAGE:
    tuneforge <input> [options]
    tuneforge --inspect <file.flac>...
    tuneforge --shift-lyrics <file.lrc> <seconds>

OPTIONS:
    -ss <time>            Start offset (seconds or [[h:]m:]s[.frac])
    -t <time>             Duration to keep (same format)
    -o <path>             Output file (.flac is enforced)
    -l <file.lrc>         Embed lyrics from an LRC file
    -metadata <file.txt>  Write tags and cover from a metadata file
    -c <0-8>              FLAC compression level
    -v                    Verbose logging
    --config <path>       Use a specific settings file
    -h, --help            Show this help

EXAMPLES:
    tuneforge input.mp4 -ss 7 -l lyrics.lrc
    tuneforge input.mp4 -ss 00:30 -t 3:00 -o song.flac
    tuneforge song.flac -metadata tags.txt
    tuneforge --shift-lyrics lyrics.lrc -7
";

/// Errors in the command line itself
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    #[error("no input file given")]
    MissingInput,

    #[error("option {0} needs a value")]
    MissingValue(String),

    #[error("cannot parse time '{value}' for {flag}")]
    InvalidTime { flag: String, value: String },

    #[error("FLAC compression level must be 0-{max}, got '{value}'", max = MAX_COMPRESSION_LEVEL)]
    InvalidCompression { value: String },

    #[error("invalid lyric offset '{0}', expected seconds such as 5 or -7.5")]
    InvalidOffset(String),
}

/// A conversion request as typed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub start: Option<f64>,
    pub duration: Option<f64>,
    pub lyrics: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    /// Overrides the configured default
    pub compression_level: Option<u8>,
}

impl ConvertArgs {
    /// Output path with defaults and the `.flac` extension applied
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => ensure_flac_extension(path.clone()),
            None => default_output_path(&self.input, self.lyrics.is_some()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Convert(ConvertArgs),
    Inspect(Vec<PathBuf>),
    ShiftLyrics { path: PathBuf, offset: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub command: Command,
    pub verbose: bool,
    pub config: Option<PathBuf>,
    /// Ignored arguments, reported to the user
    pub warnings: Vec<String>,
}

/// Parse arguments (without the program name)
pub fn parse_args<I>(args: I) -> Result<Cli, CliError>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    let mut cli = Cli {
        command: Command::Help,
        verbose: false,
        config: None,
        warnings: Vec::new(),
    };

    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        return Ok(cli);
    }

    let mut convert = ConvertArgs::default();
    let mut positionals = Vec::new();
    let mut inspect = false;
    let mut shift = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let mut value = || iter.next().ok_or_else(|| CliError::MissingValue(arg.clone()));
        match arg.as_str() {
            "-ss" => convert.start = Some(time_value(&arg, value()?)?),
            "-t" => convert.duration = Some(time_value(&arg, value()?)?),
            "-o" => convert.output = Some(PathBuf::from(value()?)),
            "-l" => convert.lyrics = Some(PathBuf::from(value()?)),
            "-metadata" => convert.metadata = Some(PathBuf::from(value()?)),
            "-c" => convert.compression_level = Some(compression_value(value()?)?),
            "--config" => cli.config = Some(PathBuf::from(value()?)),
            "-v" | "--verbose" => cli.verbose = true,
            "--inspect" => inspect = true,
            "--shift-lyrics" => {
                let path = PathBuf::from(value()?);
                let offset = value()?;
                let seconds = offset
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite())
                    .ok_or(CliError::InvalidOffset(offset))?;
                shift = Some((path, seconds));
            }
            other if other.starts_with('-') && other.len() > 1 => {
                cli.warnings.push(format!("unknown option {}", other));
            }
            _ => positionals.push(PathBuf::from(arg)),
        }
    }

    cli.command = if let Some((path, offset)) = shift {
        Command::ShiftLyrics { path, offset }
    } else if inspect {
        if positionals.is_empty() {
            return Err(CliError::MissingInput);
        }
        Command::Inspect(positionals)
    } else {
        let mut positionals = positionals.into_iter();
        convert.input = positionals.next().ok_or(CliError::MissingInput)?;
        for extra in positionals {
            cli.warnings
                .push(format!("ignoring extra argument {}", extra.display()));
        }
        Command::Convert(convert)
    };

    Ok(cli)
}

fn time_value(flag: &str, value: String) -> Result<f64, CliError> {
    parse_time(&value).ok_or_else(|| CliError::InvalidTime {
        flag: flag.to_string(),
        value,
    })
}

fn compression_value(value: String) -> Result<u8, CliError> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|level| *level <= MAX_COMPRESSION_LEVEL)
        .ok_or(CliError::InvalidCompression { value })
}
