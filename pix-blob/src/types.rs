use bytes::Bytes;
use futures_core::Stream;
use rand::RngCore;
use serde::Serialize;
use std::pin::Pin;
use uuid::Uuid;

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Single-chunk stream over an in-memory buffer.
pub fn once_stream(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Random opaque token naming a stored artifact.
///
/// 20 bytes from the OS CSPRNG, lower-case hex (40 characters). The same
/// token is used as file stem and as public slug. No existence check is
/// made before use: with 160 bits the collision probability is negligible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ArtifactToken(String);

impl ArtifactToken {
    /// Bytes of entropy per token.
    pub const ENTROPY_BYTES: usize = 20;

    /// Generate a new random token
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::ENTROPY_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is storing, and under which request id the logs should appear.
#[derive(Debug, Clone)]
pub struct BlobCtx {
    pub actor_id: Option<String>,
    pub request_id: String,
}

impl BlobCtx {
    pub fn new() -> Self {
        Self {
            actor_id: None,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_actor<S: Into<String>>(mut self, actor_id: S) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_request_id<S: Into<String>>(mut self, request_id: S) -> Self {
        self.request_id = request_id.into();
        self
    }
}

impl Default for BlobCtx {
    fn default() -> Self {
        Self::new()
    }
}

/// Request to store a blob
#[derive(Debug, Clone, Default)]
pub struct BlobPut {
    pub content_type: Option<String>,
    /// File extension without the dot (`"jpeg"`)
    pub extension: Option<String>,
}

impl BlobPut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.extension = Some(extension.into());
        self
    }
}
