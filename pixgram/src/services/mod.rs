use std::sync::Arc;

use pix_axum::UploadLimits;
use pix_blob::{BlobAdapter, BlobConfig, BlobStore};
use pix_core::{ImageStore, PixConfigSnapshot, UserStore};

pub mod adapters;
pub mod feed;
pub mod images;
pub mod likes;
pub mod uploads;
pub mod users;
mod types;

pub use feed::FeedService;
pub use images::ImageService;
pub use likes::{LikeEngine, LikeToggle};
pub use types::PixState;
pub use uploads::{StoredFile, UploadService};
pub use users::{FollowToggle, UserService};

use crate::media::Transcoder;

/// Wire every service against the given stores.
pub fn configure<S>(
    config: &PixConfigSnapshot,
    images: Arc<dyn ImageStore>,
    users: Arc<dyn UserStore>,
    blobs: S,
) -> PixState
where
    S: BlobStore + 'static,
{
    let blobs = BlobAdapter::new(blobs, BlobConfig::default());
    let feed_limit = config
        .get_usize("feed.limit")
        .unwrap_or(feed::DEFAULT_FEED_LIMIT);

    PixState {
        users: Arc::clone(&users),
        limits: UploadLimits::from_config(config),
        uploads: Arc::new(UploadService::new(
            Transcoder::from_config(config),
            blobs,
            Arc::clone(&images),
            Arc::clone(&users),
        )),
        likes: Arc::new(LikeEngine::new(Arc::clone(&images), Arc::clone(&users))),
        feed: Arc::new(FeedService::new(Arc::clone(&images), feed_limit)),
        accounts: Arc::new(UserService::new(Arc::clone(&users))),
        images: Arc::new(ImageService::new(images)),
    }
}
