//! # Errors
//!
//! Pixgram carries a small, structured error taxonomy through `anyhow::Error`.
//! Core goals:
//! - one kind per failure the pipeline can surface (bad file type, corrupt
//!   image, persistence, missing document, missing principal)
//! - stable status codes + class names for transports
//! - transport-agnostic (the HTTP crate decides how to serialize)

use std::fmt;

use anyhow::Error as AnyError;

/// A convenience result type for Pixgram core APIs.
pub type PixResult<T> = std::result::Result<T, AnyError>;

/// Error kinds with their transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotAuthenticated, // 401
    NotFound,         // 404
    Timeout,          // 408
    PayloadTooLarge,  // 413
    InvalidFileType,  // 415
    CorruptImage,     // 422
    PersistenceError, // 500
    GeneralError,     // 500
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::Timeout => 408,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::InvalidFileType => 415,
            ErrorKind::CorruptImage => 422,
            ErrorKind::PersistenceError => 500,
            ErrorKind::GeneralError => 500,
        }
    }

    /// Error `name` (e.g. "NotFound")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::InvalidFileType => "InvalidFileType",
            ErrorKind::CorruptImage => "CorruptImage",
            ErrorKind::PersistenceError => "PersistenceError",
            ErrorKind::GeneralError => "GeneralError",
        }
    }

    /// Error `className` (kebab-cased)
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotAuthenticated => "not-authenticated",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::PayloadTooLarge => "payload-too-large",
            ErrorKind::InvalidFileType => "invalid-file-type",
            ErrorKind::CorruptImage => "corrupt-image",
            ErrorKind::PersistenceError => "persistence-error",
            ErrorKind::GeneralError => "general-error",
        }
    }
}

/// A structured Pixgram error that can live inside `anyhow::Error`.
///
/// Fields:
/// - kind (name, code and class name derive from it)
/// - message
/// - data (optional)
/// - errors (optional, per-field details)
#[derive(Debug)]
pub struct PixError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub errors: Option<serde_json::Value>,
    pub source: Option<AnyError>,
}

impl PixError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            errors: None,
            source: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_errors(mut self, errors: serde_json::Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Convert into `anyhow::Error` so it flows through service results.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `PixError` anywhere in an `anyhow::Error` chain.
    pub fn from_anyhow(err: &AnyError) -> Option<&PixError> {
        err.chain().find_map(|e| e.downcast_ref::<PixError>())
    }

    /// Kind of the first `PixError` in the chain, if any.
    pub fn kind_of(err: &AnyError) -> Option<ErrorKind> {
        Self::from_anyhow(err).map(|e| e.kind)
    }

    /// Turn any error into a PixError:
    /// - if it's already a PixError, keep it (lossless)
    /// - otherwise wrap as GeneralError
    pub fn normalize(err: AnyError) -> PixError {
        match err.downcast::<PixError>() {
            Ok(pix) => pix,
            Err(other) => PixError::new(ErrorKind::GeneralError, other.to_string()).with_source(other),
        }
    }

    /// A copy suitable for returning to clients: the inner `source` is dropped.
    pub fn sanitize_for_client(&self) -> PixError {
        PixError {
            kind: self.kind,
            message: self.message.clone(),
            data: self.data.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(d) = &self.data {
            base["data"] = d.clone();
        }
        if let Some(e) = &self.errors {
            base["errors"] = e.clone();
        }
        base
    }

    // ---- Constructors ----

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, msg)
    }
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, msg)
    }
    pub fn invalid_file_type(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFileType, msg)
    }
    pub fn corrupt_image(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptImage, msg)
    }
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PersistenceError, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
}

impl fmt::Display for PixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for PixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience helper for "bail with PixError".
#[macro_export]
macro_rules! bail_pix {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::PixError::$ctor($msg).into_anyhow())
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::PixError::$ctor(format!($fmt, $($arg)*)).into_anyhow())
    };
}
