//! Cover image resolution and normalization
//!
//! A cover can be given as a local file, a remote URL or an inline
//! `data:image/...;base64,` blob. Whatever the source, the result is a local
//! image file the media tool can attach as a picture stream: JPEG and PNG are
//! used as-is, anything else is flattened onto white and re-encoded as JPEG.

use base64::{Engine as _, engine::general_purpose};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use reqwest::{Client, header};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::features::settings::CoverSettings;
use crate::utils::{detect_image_format, process_temp_path};

/// Extensions after which a CDN appends `@<resize params>`
const CDN_SUFFIX_EXTENSIONS: &[&str] = &[".jpg@", ".jpeg@", ".png@", ".webp@"];

/// Where a cover image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverSpec {
    /// A file on the local filesystem
    LocalPath(PathBuf),
    /// An http(s) URL
    RemoteUrl(String),
    /// A `data:` URI; `raw` is the full specifier text
    InlineEncoded { mime_type: String, raw: String },
}

impl CoverSpec {
    /// Classify a cover specifier by its prefix
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("data:image/") {
            let subtype = rest
                .split([';', ','])
                .next()
                .unwrap_or_default();
            CoverSpec::InlineEncoded {
                mime_type: format!("image/{}", subtype),
                raw: raw.to_string(),
            }
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            CoverSpec::RemoteUrl(raw.to_string())
        } else {
            CoverSpec::LocalPath(PathBuf::from(raw))
        }
    }

    /// Short human-readable description for status output
    pub fn describe(&self) -> String {
        match self {
            CoverSpec::LocalPath(path) => path.display().to_string(),
            CoverSpec::RemoteUrl(url) => url.clone(),
            CoverSpec::InlineEncoded { mime_type, raw } => {
                format!("inline {} ({} chars)", mime_type, raw.len())
            }
        }
    }
}

/// Errors raised while resolving a cover
#[derive(Debug, Error)]
pub enum CoverError {
    #[error("invalid inline image encoding: {0}")]
    InvalidEncoding(String),

    #[error("cover image not found: {}", .0.display())]
    CoverNotFound(PathBuf),

    #[error("failed to fetch cover image: {0}")]
    FetchFailed(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("cover IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A cover ready to be attached
///
/// When `temporary` is set the file was produced by the normalizer and the
/// caller must remove it after use. A caller-supplied local file is never
/// temporary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCover {
    pub path: PathBuf,
    pub temporary: bool,
}

impl NormalizedCover {
    /// Delete the file if the normalizer created it
    pub fn remove_temporary(&self) {
        if !self.temporary {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed temporary cover {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove temporary cover {:?}: {}", self.path, e),
        }
    }
}

/// Resolves cover specifiers into local embeddable image files
#[derive(Debug, Clone)]
pub struct CoverNormalizer {
    client: Client,
    settings: CoverSettings,
    temp_dir: PathBuf,
}

impl CoverNormalizer {
    pub fn new(settings: CoverSettings) -> Result<Self, CoverError> {
        Self::with_temp_dir(settings, std::env::temp_dir())
    }

    /// Create a normalizer that writes its temporary files into `temp_dir`
    pub fn with_temp_dir(settings: CoverSettings, temp_dir: PathBuf) -> Result<Self, CoverError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()
            .map_err(CoverError::HttpClient)?;
        Ok(Self {
            client,
            settings,
            temp_dir,
        })
    }

    /// Resolve a cover specifier into a local image file
    pub async fn normalize(&self, spec: &CoverSpec) -> Result<NormalizedCover, CoverError> {
        match spec {
            CoverSpec::InlineEncoded { raw, .. } => {
                tracing::info!("Decoding inline cover image");
                let data = decode_inline(raw)?;
                let path = self.temp_path(&data, detect_image_format(&data));
                tokio::fs::write(&path, &data).await?;
                Ok(NormalizedCover {
                    path,
                    temporary: true,
                })
            }
            CoverSpec::RemoteUrl(url) => {
                let data = self.fetch(url).await?;
                let quality = self.settings.jpeg_quality;
                let prepared =
                    tokio::task::spawn_blocking(move || prepare_remote_bytes(data, quality))
                        .await
                        .map_err(std::io::Error::other)?;
                let path = self.temp_path(&prepared, detect_image_format(&prepared));
                tokio::fs::write(&path, &prepared).await?;
                Ok(NormalizedCover {
                    path,
                    temporary: true,
                })
            }
            CoverSpec::LocalPath(path) => self.normalize_local(path).await,
        }
    }

    async fn normalize_local(&self, path: &Path) -> Result<NormalizedCover, CoverError> {
        if !path.is_file() {
            return Err(CoverError::CoverNotFound(path.to_path_buf()));
        }

        let original = NormalizedCover {
            path: path.to_path_buf(),
            temporary: false,
        };

        let data = tokio::fs::read(path).await?;
        if is_embeddable(&data) {
            return Ok(original);
        }

        let quality = self.settings.jpeg_quality;
        let source = path.to_path_buf();
        let converted = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&data).and_then(|img| encode_flattened_jpeg(&img, quality))
        })
        .await
        .map_err(std::io::Error::other)?;

        match converted {
            Ok(jpeg) => {
                let out = self.temp_path(&jpeg, "jpg");
                tokio::fs::write(&out, &jpeg).await?;
                tracing::info!("Converted local cover {:?} to JPEG {:?}", source, out);
                Ok(NormalizedCover {
                    path: out,
                    temporary: true,
                })
            }
            Err(e) => {
                tracing::warn!(
                    "Could not open cover {:?} as an image ({}), using it unchanged",
                    source,
                    e
                );
                Ok(original)
            }
        }
    }

    /// Single GET with browser-like headers
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CoverError> {
        let clean = clean_cover_url(url);
        tracing::info!("Downloading cover image: {}", clean);

        let response = self
            .client
            .get(clean)
            .header(header::USER_AGENT, &self.settings.user_agent)
            .header(header::ACCEPT, "image/webp,image/apng,image/*,*/*;q=0.8")
            .header(header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
            .header(header::REFERER, &self.settings.referer)
            .send()
            .await
            .map_err(|e| CoverError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoverError::FetchFailed(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoverError::FetchFailed(e.to_string()))?;
        tracing::debug!("Downloaded {} bytes of cover data", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Process-scoped temp file name, unique per cover content
    fn temp_path(&self, data: &[u8], ext: &str) -> PathBuf {
        process_temp_path(
            &self.temp_dir,
            "cover",
            &format!("{:016x}", xxh3_64(data)),
            ext,
        )
    }
}

/// Drop CDN resize/compression parameters appended after `@`
///
/// Only applies when a known image extension sits right before the `@`, e.g.
/// `.../cover.jpg@672w_378h_1c.avif` becomes `.../cover.jpg`.
pub fn clean_cover_url(url: &str) -> &str {
    if CDN_SUFFIX_EXTENSIONS.iter().any(|ext| url.contains(ext)) {
        if let Some((base, _)) = url.split_once('@') {
            return base;
        }
    }
    url
}

/// Decode the payload of an inline `data:` cover
///
/// Missing `=` padding (1 to 3 characters) is restored before decoding.
pub fn decode_inline(raw: &str) -> Result<Vec<u8>, CoverError> {
    let payload = match raw.split_once(',') {
        Some((_, data)) => data,
        None => raw,
    }
    .trim();

    if payload.is_empty() {
        return Err(CoverError::InvalidEncoding("empty payload".to_string()));
    }

    let body = payload.trim_end_matches('=');
    let padding = payload.len() - body.len();
    if padding > 2
        || !body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
    {
        return Err(CoverError::InvalidEncoding(
            "payload contains characters outside the base64 alphabet".to_string(),
        ));
    }

    let mut padded = payload.to_string();
    let remainder = padded.len() % 4;
    if remainder != 0 {
        padded.push_str(&"=".repeat(4 - remainder));
    }

    general_purpose::STANDARD
        .decode(padded.as_bytes())
        .map_err(|e| CoverError::InvalidEncoding(e.to_string()))
}

/// JPEG and PNG can be attached without conversion
pub fn is_embeddable(data: &[u8]) -> bool {
    matches!(
        image::guess_format(data),
        Ok(ImageFormat::Jpeg) | Ok(ImageFormat::Png)
    )
}

/// Keep embeddable bytes, convert the rest to JPEG; undecodable data is kept
/// as downloaded
fn prepare_remote_bytes(data: Vec<u8>, quality: u8) -> Vec<u8> {
    if is_embeddable(&data) {
        return data;
    }

    match image::load_from_memory(&data).and_then(|img| encode_flattened_jpeg(&img, quality)) {
        Ok(jpeg) => {
            tracing::info!("Converted downloaded cover to JPEG");
            jpeg
        }
        Err(e) => {
            tracing::warn!("Could not decode downloaded cover ({}), keeping original bytes", e);
            data
        }
    }
}

/// Composite any transparency onto a white background
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Flatten and encode as JPEG at the given quality
pub fn encode_flattened_jpeg(img: &DynamicImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let rgb = flatten_onto_white(img);
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality).encode_image(&rgb)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    // 1x1 red PNG
    const RED_PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn normalizer(dir: &Path) -> CoverNormalizer {
        CoverNormalizer::with_temp_dir(CoverSettings::default(), dir.to_path_buf()).unwrap()
    }

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    #[test]
    fn test_parse_spec_variants() {
        assert_eq!(
            CoverSpec::parse("data:image/png;base64,AAAA"),
            CoverSpec::InlineEncoded {
                mime_type: "image/png".to_string(),
                raw: "data:image/png;base64,AAAA".to_string()
            }
        );
        assert_eq!(
            CoverSpec::parse("https://example.com/a.jpg"),
            CoverSpec::RemoteUrl("https://example.com/a.jpg".to_string())
        );
        assert_eq!(
            CoverSpec::parse("http://example.com/a.jpg"),
            CoverSpec::RemoteUrl("http://example.com/a.jpg".to_string())
        );
        assert_eq!(
            CoverSpec::parse("/tmp/cover.png"),
            CoverSpec::LocalPath(PathBuf::from("/tmp/cover.png"))
        );
    }

    #[test]
    fn test_decode_inline_padded_and_prefixed() {
        let plain = decode_inline(RED_PIXEL_PNG).unwrap();
        let prefixed = decode_inline(&format!("data:image/png;base64,{}", RED_PIXEL_PNG)).unwrap();
        assert_eq!(plain, prefixed);
        assert!(plain.starts_with(&[0x89, 0x50, 0x4E, 0x47]));
    }

    #[test]
    fn test_decode_inline_restores_missing_padding() {
        let unpadded = RED_PIXEL_PNG.trim_end_matches('=');
        let decoded = decode_inline(&format!("data:image/png;base64,{}", unpadded)).unwrap();
        assert_eq!(decoded, decode_inline(RED_PIXEL_PNG).unwrap());
    }

    #[test]
    fn test_decode_inline_rejects_garbage() {
        assert!(matches!(
            decode_inline("invalid_base64_string"),
            Err(CoverError::InvalidEncoding(_))
        ));
        assert!(matches!(
            decode_inline("data:image/png;base64,"),
            Err(CoverError::InvalidEncoding(_))
        ));
        assert_eq!(decode_inline("QUJDRA").unwrap(), b"ABCD");
        // One character past a full quantum can never be valid base64
        assert!(matches!(
            decode_inline("QUJDR"),
            Err(CoverError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_clean_cover_url() {
        assert_eq!(
            clean_cover_url("https://i2.hdslb.com/bfs/archive/x.jpg@672w_378h_1c_!web.avif"),
            "https://i2.hdslb.com/bfs/archive/x.jpg"
        );
        assert_eq!(
            clean_cover_url("https://example.com/user@host/a.jpg"),
            "https://example.com/user@host/a.jpg"
        );
        assert_eq!(clean_cover_url("https://example.com/a.png"), "https://example.com/a.png");
    }

    #[test]
    fn test_flatten_transparent_pixel_becomes_white() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let flat = flatten_onto_white(&DynamicImage::ImageRgba8(img));
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_remote_bytes_policy() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 128, 0, 128])));
        let png = encode(&img, ImageFormat::Png);
        assert_eq!(prepare_remote_bytes(png.clone(), 95), png);

        let bmp = encode(&DynamicImage::ImageRgb8(img.to_rgb8()), ImageFormat::Bmp);
        let converted = prepare_remote_bytes(bmp, 95);
        assert_eq!(image::guess_format(&converted).unwrap(), ImageFormat::Jpeg);

        let garbage = b"definitely not an image".to_vec();
        assert_eq!(prepare_remote_bytes(garbage.clone(), 95), garbage);
    }

    #[tokio::test]
    async fn test_inline_cover_written_to_temp() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CoverSpec::parse(&format!("data:image/png;base64,{}", RED_PIXEL_PNG));
        let cover = normalizer(dir.path()).normalize(&spec).await.unwrap();
        assert!(cover.temporary);
        assert!(cover.path.starts_with(dir.path()));
        assert_eq!(cover.path.extension().unwrap(), "png");
        assert!(cover.path.exists());

        cover.remove_temporary();
        assert!(!cover.path.exists());
    }

    #[tokio::test]
    async fn test_local_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CoverSpec::LocalPath(dir.path().join("missing.jpg"));
        let result = normalizer(dir.path()).normalize(&spec).await;
        assert!(matches!(result, Err(CoverError::CoverNotFound(_))));
    }

    #[tokio::test]
    async fn test_local_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("cover.jpg");
        std::fs::create_dir(&folder).unwrap();

        let spec = CoverSpec::LocalPath(folder);
        let result = normalizer(dir.path()).normalize(&spec).await;
        assert!(matches!(result, Err(CoverError::CoverNotFound(_))));
    }

    #[tokio::test]
    async fn test_local_png_used_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        std::fs::write(&path, decode_inline(RED_PIXEL_PNG).unwrap()).unwrap();

        let cover = normalizer(dir.path())
            .normalize(&CoverSpec::LocalPath(path.clone()))
            .await
            .unwrap();
        assert_eq!(cover, NormalizedCover { path: path.clone(), temporary: false });

        // Never deletes caller input
        cover.remove_temporary();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_local_bmp_converted_to_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.bmp");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, image::Rgb([200, 10, 10])));
        std::fs::write(&path, encode(&img, ImageFormat::Bmp)).unwrap();

        let cover = normalizer(dir.path())
            .normalize(&CoverSpec::LocalPath(path.clone()))
            .await
            .unwrap();
        assert!(cover.temporary);
        assert_ne!(cover.path, path);
        let data = std::fs::read(&cover.path).unwrap();
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_local_unreadable_falls_back_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.avif");
        std::fs::write(&path, b"corrupt bytes").unwrap();

        let cover = normalizer(dir.path())
            .normalize(&CoverSpec::LocalPath(path.clone()))
            .await
            .unwrap();
        assert_eq!(cover.path, path);
        assert!(!cover.temporary);
    }
}
