use serde::Serialize;

use crate::ArtifactToken;

/// What was written for one artifact.
#[derive(Debug, Clone, Serialize)]
pub struct BlobReceipt {
    pub token: ArtifactToken,
    /// Store-relative key (`<token>.<ext>`, possibly prefixed)
    pub key: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

impl BlobReceipt {
    pub fn new(token: ArtifactToken, key: String, size_bytes: u64) -> Self {
        Self {
            token,
            key,
            size_bytes,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}
