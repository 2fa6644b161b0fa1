use async_trait::async_trait;
use crate::{BlobError, BlobResult, ByteStream};

/// Durable storage for named artifacts.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob from a stream.
    ///
    /// The blob becomes readable under `key` only once the whole stream has
    /// been written. An existing key is never overwritten.
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult>;

    /// Remove a blob; `NotFound` when nothing is stored under `key`.
    async fn delete(&self, key: &str) -> BlobResult<()>;
}

#[derive(Debug, Clone)]
pub struct PutResult {
    pub size_bytes: u64,
}

/// `<prefix>/<token>.<ext>`, prefix and extension optional.
#[derive(Debug, Clone, Default)]
pub struct KeyLayout {
    pub prefix: Option<String>,
}

impl KeyLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    /// Key for the artifact named by `token`.
    pub fn object_key(&self, token: &str, extension: Option<&str>) -> String {
        let file = match extension.filter(|e| !e.is_empty()) {
            Some(ext) => format!("{}.{}", token, ext),
            None => token.to_string(),
        };
        match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{}/{}", prefix, file),
            _ => file,
        }
    }
}

/// Reject keys that could escape a storage root.
pub fn validate_key(key: &str) -> BlobResult<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(BlobError::invalid_key(key));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(BlobError::invalid_key(key));
    }
    Ok(())
}
