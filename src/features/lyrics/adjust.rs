//! Whole-file lyric timing shift
//!
//! Moves every timestamp of an LRC file earlier or later by a fixed number of
//! seconds. Useful after trimming the start of the audio with `-ss`.

use std::path::{Path, PathBuf};

use super::parser::{TIMESTAMP, format_timestamp, strip_timestamps, token_to_centis};

/// Shift all timestamps in LRC text by `offset_secs`
///
/// Timestamps are clamped at zero and rewritten as `[mm:ss.cc]`. The
/// `[offset:N]` header gets `offset_secs * 1000` added. Untimed lines are kept
/// verbatim, blank lines stay blank. Every line ends with `\n`.
pub fn shift_lyrics(content: &str, offset_secs: f64) -> String {
    let offset_centis = (offset_secs * 100.0).round() as i64;
    let mut out = Vec::new();

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            out.push(String::new());
            continue;
        }

        let stamps: Vec<u64> = TIMESTAMP
            .captures_iter(line)
            .filter_map(|caps| token_to_centis(&caps))
            .collect();

        if stamps.is_empty() {
            out.push(shift_offset_header(line, offset_secs).unwrap_or_else(|| line.to_string()));
            continue;
        }

        let mut rebuilt = String::new();
        for centis in stamps {
            let shifted = (centis as i64 + offset_centis).max(0) as u64;
            rebuilt.push_str(&format_timestamp(shifted));
        }
        rebuilt.push_str(&strip_timestamps(line));
        out.push(rebuilt);
    }

    out.iter().map(|line| format!("{}\n", line)).collect()
}

/// Rewrite an `[offset:N]` header line, if that is what the line is
fn shift_offset_header(line: &str, offset_secs: f64) -> Option<String> {
    let value = line.strip_prefix("[offset:")?.strip_suffix(']')?;
    let current: i64 = value.trim().parse().ok()?;
    let shifted = current + (offset_secs * 1000.0) as i64;
    Some(format!("[offset:{}]", shifted))
}

/// Output path for a shifted file: `song_+5.0s.lrc` / `song-7.5s.lrc`
pub fn shifted_file_path(path: &Path, offset_secs: f64) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lyrics".to_string());
    let seconds = format_offset(offset_secs);
    let name = if offset_secs >= 0.0 {
        format!("{}_+{}s.lrc", stem, seconds)
    } else {
        format!("{}{}s.lrc", stem, seconds)
    };
    path.with_file_name(name)
}

/// Whole offsets keep one decimal (`5.0`)
fn format_offset(offset_secs: f64) -> String {
    if offset_secs.fract() == 0.0 {
        format!("{:.1}", offset_secs)
    } else {
        offset_secs.to_string()
    }
}
