//! Decode, bound the width, re-encode.

use std::io::Cursor;
use std::time::Duration;

use bytes::Bytes;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageError, ImageFormat, ImageReader, Limits};
use pix_core::{PixConfigSnapshot, PixError, UploadedArtifact};
use tracing::instrument;

pub const DEFAULT_MAX_WIDTH: u32 = 1080;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Largest source side the decoder will accept.
pub const DEFAULT_MAX_SOURCE_DIMENSION: u32 = 16_384;
const MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

/// The derived artifact, ready to be written.
#[derive(Debug, Clone)]
pub struct TranscodedImage {
    pub bytes: Bytes,
    pub content_type: String,
    /// Stored file extension, the MIME subtype (`jpeg`)
    pub extension: String,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

/// Output size for a source of `width`×`height`.
///
/// Width is clamped to `max_width`; height follows proportionally, rounded
/// to nearest and never below 1. Narrower sources keep their size.
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled = (u64::from(height) * u64::from(max_width) + u64::from(width) / 2) / u64::from(width);
    let scaled = u32::try_from(scaled).unwrap_or(u32::MAX).max(1);
    (max_width, scaled)
}

#[derive(Debug, Clone, Copy)]
pub struct Transcoder {
    max_width: u32,
    max_source_dimension: u32,
    timeout: Duration,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WIDTH, DEFAULT_TIMEOUT)
    }
}

impl Transcoder {
    pub fn new(max_width: u32, timeout: Duration) -> Self {
        Self {
            max_width: max_width.max(1),
            max_source_dimension: DEFAULT_MAX_SOURCE_DIMENSION,
            timeout,
        }
    }

    /// Sources wider or taller than `max` are refused before decoding.
    pub fn with_max_source_dimension(mut self, max: u32) -> Self {
        self.max_source_dimension = max.max(1);
        self
    }

    pub fn from_config(config: &PixConfigSnapshot) -> Self {
        Self::new(
            config.get_u32("media.max_width").unwrap_or(DEFAULT_MAX_WIDTH),
            config
                .get_u64("media.transcode_timeout_ms")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
        )
        .with_max_source_dimension(
            config
                .get_u32("media.max_source_dimension")
                .unwrap_or(DEFAULT_MAX_SOURCE_DIMENSION),
        )
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    fn decode_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_source_dimension);
        limits.max_image_height = Some(self.max_source_dimension);
        limits.max_alloc = Some(MAX_DECODE_ALLOC);
        limits
    }

    /// Run on the blocking pool, bounded by the configured timeout.
    #[instrument(skip_all, fields(content_type = %artifact.content_type, bytes = artifact.len()))]
    pub async fn transcode(&self, artifact: UploadedArtifact) -> anyhow::Result<TranscodedImage> {
        let this = *self;
        let job = tokio::task::spawn_blocking(move || this.transcode_blocking(&artifact));

        match tokio::time::timeout(self.timeout, job).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(PixError::general_error("Transcoding task failed")
                .with_source(join.into())
                .into_anyhow()),
            Err(_) => Err(PixError::timeout(format!(
                "Transcoding did not finish within {} ms",
                self.timeout.as_millis()
            ))
            .into_anyhow()),
        }
    }
}

fn corrupt(message: impl Into<String>) -> anyhow::Error {
    PixError::corrupt_image(message).into_anyhow()
}

impl Transcoder {
    /// Synchronous decode, resize and encode.
    ///
    /// Decoding runs under size limits, so an oversized source is refused
    /// from its header instead of occupying a blocking thread past the
    /// request timeout.
    pub fn transcode_blocking(&self, artifact: &UploadedArtifact) -> anyhow::Result<TranscodedImage> {
        let format = ImageFormat::from_mime_type(&artifact.content_type)
            .filter(|f| f.reading_enabled() && f.writing_enabled())
            .ok_or_else(|| corrupt(format!("Unsupported image type {}", artifact.content_type)))?;

        let mut reader = ImageReader::with_format(Cursor::new(&artifact.bytes[..]), format);
        reader.limits(self.decode_limits());
        let decoded = reader.decode().map_err(|e| match e {
            ImageError::Limits(_) => PixError::payload_too_large(format!(
                "Image is larger than {} pixels on a side",
                self.max_source_dimension
            ))
            .into_anyhow(),
            e => corrupt(format!("Could not decode the uploaded image: {e}")),
        })?;

        let (source_width, source_height) = decoded.dimensions();
        let (width, height) = target_dimensions(source_width, source_height, self.max_width);

        let resized = if (width, height) == (source_width, source_height) {
            decoded
        } else {
            decoded.resize_exact(width, height, FilterType::Lanczos3)
        };

        let encodable = normalize_pixels(resized, format);
        let mut out = Cursor::new(Vec::new());
        encodable
            .write_to(&mut out, format)
            .map_err(|e| corrupt(format!("Could not encode image: {e}")))?;

        tracing::debug!(source_width, source_height, width, height, "transcoded");

        Ok(TranscodedImage {
            bytes: Bytes::from(out.into_inner()),
            content_type: artifact.content_type.clone(),
            extension: artifact.subtype().to_string(),
            width,
            height,
            source_width,
            source_height,
        })
    }
}

/// Pixel layout the target encoder accepts: float for HDR and OpenEXR,
/// 16-bit RGBA for farbfeld, otherwise 8-bit RGB(A). JPEG drops alpha.
fn normalize_pixels(img: DynamicImage, format: ImageFormat) -> DynamicImage {
    let alpha = img.color().has_alpha();
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        ImageFormat::Hdr => DynamicImage::ImageRgb32F(img.to_rgb32f()),
        ImageFormat::OpenExr if alpha => DynamicImage::ImageRgba32F(img.to_rgba32f()),
        ImageFormat::OpenExr => DynamicImage::ImageRgb32F(img.to_rgb32f()),
        ImageFormat::Farbfeld => DynamicImage::ImageRgba16(img.to_rgba16()),
        _ if alpha => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}
