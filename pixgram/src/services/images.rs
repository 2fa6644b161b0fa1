use std::sync::Arc;

use anyhow::Result;
use pix_core::{Image, ImageStore, Slug};

pub struct ImageService {
    images: Arc<dyn ImageStore>,
}

impl ImageService {
    pub fn new(images: Arc<dyn ImageStore>) -> Self {
        Self { images }
    }

    /// Public lookup by slug, the target of an upload redirect.
    pub async fn show_image(&self, slug: &Slug) -> Result<Image> {
        self.images.find_by_slug(slug).await
    }
}
