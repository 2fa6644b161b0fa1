//! pix-core: framework-agnostic core for Pixgram.
//!
//! Error taxonomy, configuration, the image and user documents, the
//! authenticated principal, and the repository traits the services are
//! built against.

pub mod artifact;
pub mod config;
pub mod errors;
pub mod models;
pub mod principal;
pub mod store;

pub use artifact::UploadedArtifact;
pub use config::{PixConfig, PixConfigSnapshot};
pub use errors::{ErrorKind, PixError, PixResult};
pub use models::{
    CommentId, Image, ImageId, ImageSummary, NewImage, NewUser, Slug, User, UserId, UserSummary,
};
pub use principal::Principal;
pub use store::{AuthorWindow, ImageStore, SetOp, UserStore};
