use thiserror::Error;

pub type BlobResult<T> = Result<T, BlobError>;

/// Storage-layer failures. The upload pipeline folds all of these into a
/// persistence error; they never reach a client as-is.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("no artifact stored under {key}")]
    NotFound { key: String },

    /// Keys are token-derived and written once.
    #[error("artifact {key} already exists")]
    AlreadyExists { key: String },

    #[error("invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("artifact is {size} bytes, store accepts at most {max}")]
    TooLarge { size: u64, max: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BlobError {
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
