//! Utility functions

use std::path::{Path, PathBuf};

// ============================================================================
// Time
// ============================================================================

/// Parse a time value given on the command line
///
/// Accepts plain decimal seconds (`90`, `12.5`) or `[[h:]m:]s[.frac]`
/// (`1:30` is ninety seconds, `1:02:03.5` is one hour, two minutes and 3.5
/// seconds). Negative or malformed values yield `None`.
pub fn parse_time(input: &str) -> Option<f64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if !input.contains(':') {
        return input
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0);
    }

    let fields: Vec<&str> = input.split(':').collect();
    if fields.len() > 3 {
        return None;
    }

    let (whole_fields, last) = fields.split_at(fields.len() - 1);
    let seconds = parse_seconds_field(last[0])?;

    let mut total = 0u64;
    for field in whole_fields {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(field.parse::<u64>().ok()?)?;
    }

    Some(total as f64 * 60.0 + seconds)
}

/// `s` or `s.frac`, digits only
fn parse_seconds_field(field: &str) -> Option<f64> {
    let (whole, frac) = match field.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (field, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || frac.is_some_and(|f| !digits(f)) {
        return None;
    }
    field.parse().ok()
}

/// Format seconds as `mm:ss` or `hh:mm:ss`, dropping the fraction
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Format seconds as `mm:ss.mmm` or `hh:mm:ss.mmm`
pub fn format_duration(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
    } else {
        format!("{:02}:{:02}.{:03}", minutes, secs, millis)
    }
}

/// Human-readable byte count, e.g. `3.50 MB`
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} TB", size)
}

// ============================================================================
// Images
// ============================================================================

/// Detect image format from magic bytes
/// Returns the matching file extension (without dot)
pub fn detect_image_format(bytes: &[u8]) -> &'static str {
    if bytes.len() < 8 {
        return "jpg"; // Default fallback
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return "png";
    }

    // JPEG: FF D8 FF
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "jpg";
    }

    // GIF: 47 49 46 38
    if bytes.starts_with(&[0x47, 0x49, 0x46, 0x38]) {
        return "gif";
    }

    // WebP: 52 49 46 46 ... 57 45 42 50
    if bytes.len() >= 12 && bytes.starts_with(&[0x52, 0x49, 0x46, 0x46]) && &bytes[8..12] == b"WEBP"
    {
        return "webp";
    }

    // AVIF: .... 66 74 79 70 61 76 69 66 ("ftypavif")
    if bytes.len() >= 12 && &bytes[4..12] == b"ftypavif" {
        return "avif";
    }

    // BMP: 42 4D
    if bytes.starts_with(&[0x42, 0x4D]) {
        return "bmp";
    }

    "jpg" // Default fallback
}

// ============================================================================
// Temporary files
// ============================================================================

/// Process-qualified temp file: `<dir>/tuneforge_<kind>_<pid>_<tag>.<ext>`
pub fn process_temp_path(dir: &Path, kind: &str, tag: &str, ext: &str) -> PathBuf {
    dir.join(format!(
        "tuneforge_{}_{}_{}.{}",
        kind,
        std::process::id(),
        tag,
        ext
    ))
}

/// Stage output next to the final file: `<stem>.tuneforge-<pid>-<stage>.flac`
///
/// Kept in the output directory so replacing the output is a same-device
/// rename.
pub fn stage_temp_path(output: &Path, stage: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!(
        "{}.tuneforge-{}-{}.flac",
        stem,
        std::process::id(),
        stage
    ))
}
