//! pix-axum: Axum adapter for Pixgram.
//!
//! App builder and listener, `PixError` → JSON responses, the photo upload
//! extractor, the principal extractor and the request id extractor.

pub mod app;
pub mod multipart;
pub mod principal;
mod error;
mod request_id;
pub use error::{map_json_rejection, PixAxumError};
pub use multipart::{PhotoUpload, UploadLimits};
pub use principal::{Authenticated, UserDirectory};
pub use request_id::RequestId;

pub use app::{axum, AxumApp};
