/// Limits and layout for stored artifacts.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Hard cap on a single derived artifact. Uploads are bounded earlier,
    /// this only guards the store.
    pub max_blob_bytes: u64,

    /// Directory segment placed before `<token>.<ext>`.
    pub key_prefix: Option<String>,
}

const DEFAULT_MAX_BLOB_BYTES: u64 = 50 * 1024 * 1024;

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
            key_prefix: None,
        }
    }
}

impl BlobConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }

    /// `with_key_prefix("photos")` stores under `photos/<token>.<ext>`.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}
