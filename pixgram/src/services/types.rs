use std::sync::Arc;

use axum::extract::FromRef;
use pix_axum::{UploadLimits, UserDirectory};

use super::{FeedService, ImageService, LikeEngine, UploadService, UserService};

/// Shared state handed to every route.
#[derive(Clone, FromRef)]
pub struct PixState {
    pub users: UserDirectory,
    pub limits: UploadLimits,
    pub uploads: Arc<UploadService>,
    pub likes: Arc<LikeEngine>,
    pub feed: Arc<FeedService>,
    pub accounts: Arc<UserService>,
    pub images: Arc<ImageService>,
}
