use std::sync::Arc;

use anyhow::Result;
use pix_core::{AuthorWindow, Image, ImageStore, Principal};

pub const DEFAULT_FEED_LIMIT: usize = 12;

/// Recent images from the viewer and the authors they follow.
pub struct FeedService {
    images: Arc<dyn ImageStore>,
    limit: usize,
}

impl FeedService {
    pub fn new(images: Arc<dyn ImageStore>, limit: usize) -> Self {
        Self { images, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn compose_feed(&self, viewer: Option<&Principal>, offset: usize) -> Result<Vec<Image>> {
        let viewer = Principal::require(viewer)?;
        let window = AuthorWindow::new(viewer.feed_authors(), self.limit).with_offset(offset);
        let images = self.images.list_by_authors(window).await?;
        tracing::debug!(viewer = %viewer.id, count = images.len(), offset, "feed composed");
        Ok(images)
    }
}
