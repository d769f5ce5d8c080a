//! Job description

use std::path::{Path, PathBuf};

use super::PipelineError;
use crate::features::import::MetadataRecord;
use crate::features::lyrics::LyricDocument;

/// Highest FLAC compression level
pub const MAX_COMPRESSION_LEVEL: u8 = 8;

/// One conversion request, fixed once built
#[derive(Debug, Clone, PartialEq)]
pub struct MediaJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Seconds to skip at the start
    pub start: Option<f64>,
    /// Seconds to keep
    pub duration: Option<f64>,
    pub lyrics: Option<LyricDocument>,
    pub metadata: Option<MetadataRecord>,
    pub compression_level: u8,
}

impl MediaJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, compression_level: u8) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            start: None,
            duration: None,
            lyrics: None,
            metadata: None,
            compression_level,
        }
    }

    pub fn with_trim(mut self, start: Option<f64>, duration: Option<f64>) -> Self {
        self.start = start;
        self.duration = duration;
        self
    }

    pub fn with_lyrics(mut self, lyrics: LyricDocument) -> Self {
        self.lyrics = Some(lyrics);
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataRecord) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check everything that can be checked before touching the tool
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.input.is_file() {
            return Err(PipelineError::InvalidJob(format!(
                "input file {} does not exist",
                self.input.display()
            )));
        }
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(PipelineError::InvalidJob(format!(
                "compression level {} is outside 0-{}",
                self.compression_level, MAX_COMPRESSION_LEVEL
            )));
        }
        for (name, value) in [("start", self.start), ("duration", self.duration)] {
            let Some(value) = value else { continue };
            if !(value.is_finite() && value >= 0.0) {
                return Err(PipelineError::InvalidJob(format!(
                    "{} time {} must be a non-negative number of seconds",
                    name, value
                )));
            }
        }
        if self.output.is_dir() {
            return Err(PipelineError::InvalidJob(format!(
                "output {} is a directory",
                self.output.display()
            )));
        }
        Ok(())
    }

    pub fn has_trim(&self) -> bool {
        self.start.is_some() || self.duration.is_some()
    }

    pub fn wants_tags(&self) -> bool {
        self.lyrics.is_some() || self.metadata.is_some()
    }

    /// Tag-only fast path: FLAC in, no trim, something to tag
    pub fn is_tag_only(&self) -> bool {
        is_flac(&self.input) && !self.has_trim() && self.wants_tags()
    }
}

/// Case-insensitive `.flac` extension check
pub fn is_flac(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("flac"))
}

/// Default output path for an input
///
/// `<stem>_trimmed.flac`, or `<stem>_trimmed_with_lyrics.flac` when lyrics are
/// embedded (`_new_lyrics` if the input already carries `_with_lyrics`).
pub fn default_output_path(input: &Path, with_lyrics: bool) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let suffix = if !with_lyrics {
        ""
    } else if stem.contains("_with_lyrics") {
        "_new_lyrics"
    } else {
        "_with_lyrics"
    };

    input.with_file_name(format!("{}_trimmed{}.flac", stem, suffix))
}

/// Force a `.flac` extension on a user-supplied output path
pub fn ensure_flac_extension(path: PathBuf) -> PathBuf {
    if is_flac(&path) {
        path
    } else {
        path.with_extension("flac")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::lyrics::parse_lrc;

    fn job_with_input(dir: &Path, name: &str) -> MediaJob {
        let input = dir.join(name);
        std::fs::write(&input, b"data").unwrap();
        MediaJob::new(input, dir.join("out.flac"), 5)
    }

    #[test]
    fn test_validate_accepts_plain_job() {
        let dir = tempfile::tempdir().unwrap();
        assert!(job_with_input(dir.path(), "in.mp4").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_with_input(dir.path(), "in.mp4");

        let missing = MediaJob::new(dir.path().join("nope.mp4"), "out.flac", 5);
        assert!(matches!(missing.validate(), Err(PipelineError::InvalidJob(_))));

        let mut level = job.clone();
        level.compression_level = 9;
        assert!(matches!(level.validate(), Err(PipelineError::InvalidJob(_))));

        let negative = job.clone().with_trim(Some(-1.0), None);
        assert!(matches!(negative.validate(), Err(PipelineError::InvalidJob(_))));

        let nan = job.with_trim(None, Some(f64::NAN));
        assert!(matches!(nan.validate(), Err(PipelineError::InvalidJob(_))));
    }

    #[test]
    fn test_tag_only_detection() {
        let dir = tempfile::tempdir().unwrap();
        let flac = job_with_input(dir.path(), "song.FLAC");
        assert!(!flac.is_tag_only());

        let tagged = flac.clone().with_lyrics(parse_lrc("[00:01.00]x"));
        assert!(tagged.is_tag_only());
        assert!(!tagged.clone().with_trim(Some(0.0), None).is_tag_only());

        let video = job_with_input(dir.path(), "clip.mp4").with_lyrics(parse_lrc("[00:01.00]x"));
        assert!(!video.is_tag_only());
    }

    #[test]
    fn test_default_output_path() {
        let input = Path::new("/music/clip.mp4");
        assert_eq!(
            default_output_path(input, false),
            PathBuf::from("/music/clip_trimmed.flac")
        );
        assert_eq!(
            default_output_path(input, true),
            PathBuf::from("/music/clip_trimmed_with_lyrics.flac")
        );
        assert_eq!(
            default_output_path(Path::new("/music/a_with_lyrics.flac"), true),
            PathBuf::from("/music/a_with_lyrics_trimmed_new_lyrics.flac")
        );
    }

    #[test]
    fn test_ensure_flac_extension() {
        assert_eq!(ensure_flac_extension(PathBuf::from("out.mp3")), PathBuf::from("out.flac"));
        assert_eq!(ensure_flac_extension(PathBuf::from("out")), PathBuf::from("out.flac"));
        assert_eq!(ensure_flac_extension(PathBuf::from("x.FLAC")), PathBuf::from("x.FLAC"));
    }
}
