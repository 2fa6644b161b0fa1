//! The raw upload as it leaves the receiver, before transcoding.

use bytes::Bytes;

use crate::errors::PixError;

/// Message returned for any declared type outside `image/*`.
pub const FILE_TYPE_REJECTED: &str = "That filetype isn't allowed!";

/// Raw bytes of one uploaded photo plus what the client declared about them.
///
/// Lives for the duration of one upload request and is never persisted as-is.
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    pub bytes: Bytes,
    /// Normalized declared MIME type (`image/jpeg`), parameters stripped
    pub content_type: String,
    pub filename: Option<String>,
}

impl UploadedArtifact {
    /// Validate a declared type and wrap the buffered bytes.
    pub fn accept(declared_mime: &str, bytes: impl Into<Bytes>) -> anyhow::Result<Self> {
        let content_type = Self::check_declared_type(declared_mime)?;
        Ok(Self {
            bytes: bytes.into(),
            content_type,
            filename: None,
        })
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Accept only `image/<subtype>`; returns the normalized type.
    ///
    /// Runs before any of the body is buffered.
    pub fn check_declared_type(declared_mime: &str) -> anyhow::Result<String> {
        let essence = declared_mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.strip_prefix("image/") {
            Some(subtype) if !subtype.is_empty() && !subtype.contains('/') => Ok(essence),
            _ => Err(PixError::invalid_file_type(FILE_TYPE_REJECTED)
                .with_data(serde_json::json!({ "contentType": declared_mime }))
                .into_anyhow()),
        }
    }

    /// MIME subtype, used as the stored file extension (`image/jpeg` → `jpeg`).
    pub fn subtype(&self) -> &str {
        self.content_type
            .split_once('/')
            .map(|(_, sub)| sub)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
