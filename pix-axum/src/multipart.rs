//! Photo upload extraction.
//!
//! Parses `multipart/form-data` with multer, checks the declared type of
//! the `photo` field before reading any of its body, and buffers the
//! accepted photo in memory up to a fixed bound. Nothing touches the disk.

use axum::extract::{FromRef, FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use bytes::BytesMut;
use pix_core::{PixConfigSnapshot, PixError, UploadedArtifact};

use crate::PixAxumError;

pub const PHOTO_FIELD: &str = "photo";
pub const CAPTION_FIELD: &str = "caption";

/// Slack for boundaries, part headers and small text fields.
const ENVELOPE_BYTES: u64 = 64 * 1024;

/// Bounds applied while reading an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_bytes: usize,
    pub caption_max_chars: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
            caption_max_chars: 140,
        }
    }
}

impl UploadLimits {
    pub fn from_config(config: &PixConfigSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            max_file_bytes: config
                .get_usize("upload.max_file_bytes")
                .unwrap_or(defaults.max_file_bytes),
            caption_max_chars: config
                .get_usize("upload.caption_max_chars")
                .unwrap_or(defaults.caption_max_chars),
        }
    }

    fn constraints(&self) -> multer::Constraints {
        let per_field = self.max_file_bytes as u64;
        multer::Constraints::new().size_limit(
            multer::SizeLimit::new()
                .per_field(per_field)
                .whole_stream(per_field.saturating_add(ENVELOPE_BYTES)),
        )
    }
}

/// The fields of one upload form.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub artifact: UploadedArtifact,
    pub caption: String,
}

/// Trim and cap a caption at a character boundary.
pub fn normalize_caption(raw: &str, max_chars: usize) -> String {
    raw.trim().chars().take(max_chars).collect::<String>().trim_end().to_string()
}

fn map_multer_error(err: multer::Error) -> PixAxumError {
    match err {
        multer::Error::FieldSizeExceeded { limit, .. } | multer::Error::StreamSizeExceeded { limit } => {
            PixError::payload_too_large(format!("Upload exceeds the limit of {limit} bytes")).into()
        }
        other => PixError::bad_request(format!("Malformed multipart body: {other}")).into(),
    }
}

impl<S> FromRequest<S> for PhotoUpload
where
    UploadLimits: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PixAxumError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let limits = UploadLimits::from_ref(state);

        let boundary = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|ct| multer::parse_boundary(ct).ok())
            .ok_or_else(|| PixError::bad_request("Expected a multipart/form-data body"))?;

        let stream = req.into_body().into_data_stream();
        let mut multipart = multer::Multipart::with_constraints(stream, boundary, limits.constraints());

        let mut artifact: Option<UploadedArtifact> = None;
        let mut caption = String::new();

        while let Some(mut field) = multipart.next_field().await.map_err(map_multer_error)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some(PHOTO_FIELD) => {
                    if artifact.is_some() {
                        return Err(PixError::bad_request("Only one photo per upload").into());
                    }

                    let declared = field
                        .content_type()
                        .map(|m| m.to_string())
                        .unwrap_or_default();
                    // Reject before a single body byte is buffered
                    let content_type = UploadedArtifact::check_declared_type(&declared)?;
                    let filename = field.file_name().map(str::to_string);

                    let mut buf = BytesMut::new();
                    while let Some(chunk) = field.chunk().await.map_err(map_multer_error)? {
                        if buf.len() + chunk.len() > limits.max_file_bytes {
                            return Err(PixError::payload_too_large(format!(
                                "Photo exceeds the limit of {} bytes",
                                limits.max_file_bytes
                            ))
                            .into());
                        }
                        buf.extend_from_slice(&chunk);
                    }

                    tracing::debug!(%content_type, bytes = buf.len(), "photo received");

                    let mut accepted = UploadedArtifact::accept(&content_type, buf.freeze())?;
                    if let Some(name) = filename {
                        accepted = accepted.with_filename(name);
                    }
                    artifact = Some(accepted);
                }
                Some(CAPTION_FIELD) => {
                    let text = field.text().await.map_err(map_multer_error)?;
                    caption = normalize_caption(&text, limits.caption_max_chars);
                }
                _ => {
                    // Drain and ignore
                    while field.chunk().await.map_err(map_multer_error)?.is_some() {}
                }
            }
        }

        let artifact = artifact
            .ok_or_else(|| PixError::bad_request("A photo is required").with_errors(
                serde_json::json!({ PHOTO_FIELD: ["required"] }),
            ))?;

        Ok(Self { artifact, caption })
    }
}
