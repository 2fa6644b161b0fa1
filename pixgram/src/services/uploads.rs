//! Upload pipeline: transcode → store → create record → count the post.
//!
//! Each stage hands an owned result to the next. The record is only created
//! after the artifact write has completed, so no image ever references a
//! partial file.

use std::sync::Arc;

use anyhow::Result;
use pix_blob::{ArtifactToken, BlobAdapter, BlobCtx, BlobError, BlobPut};
use pix_core::{Image, ImageStore, NewImage, PixError, Principal, Slug, UploadedArtifact, UserStore};
use tracing::instrument;

use crate::media::{TranscodedImage, Transcoder};

/// A transcoded artifact after it has been durably written.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub token: ArtifactToken,
    /// Store-relative path (`<token>.<ext>`)
    pub key: String,
    pub size_bytes: u64,
    pub image: TranscodedImage,
}

pub struct UploadService {
    transcoder: Transcoder,
    blobs: BlobAdapter,
    images: Arc<dyn ImageStore>,
    users: Arc<dyn UserStore>,
}

fn storage_failure(e: BlobError) -> anyhow::Error {
    PixError::persistence("Could not store the uploaded image")
        .with_source(e.into())
        .into_anyhow()
}

impl UploadService {
    pub fn new(
        transcoder: Transcoder,
        blobs: BlobAdapter,
        images: Arc<dyn ImageStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            transcoder,
            blobs,
            images,
            users,
        }
    }

    /// Run the whole pipeline for one accepted upload.
    ///
    /// `request_id` tags the storage log lines; a fresh one is made when absent.
    #[instrument(skip_all, fields(author = %author.id, request_id = tracing::field::Empty))]
    pub async fn publish(
        &self,
        author: &Principal,
        artifact: UploadedArtifact,
        caption: String,
        request_id: Option<&str>,
    ) -> Result<Image> {
        let mut ctx = BlobCtx::new().with_actor(author.id.as_str());
        if let Some(id) = request_id {
            ctx = ctx.with_request_id(id);
        }
        tracing::Span::current().record("request_id", ctx.request_id.as_str());

        let transcoded = self.transcoder.transcode(artifact).await?;
        let stored = self.store(&ctx, transcoded).await?;

        let new_image = NewImage {
            slug: Slug::from(stored.token.as_str()),
            author: author.id.clone(),
            storage_path: stored.key.clone(),
            content_type: stored.image.content_type.clone(),
            width: stored.image.width,
            height: stored.image.height,
            caption,
        };

        let image = match self.images.create(new_image).await {
            Ok(image) => image,
            Err(e) => {
                self.blobs.discard(&ctx, &stored.key).await;
                return Err(match PixError::kind_of(&e) {
                    Some(_) => e,
                    None => PixError::persistence("Could not save the image record")
                        .with_source(e)
                        .into_anyhow(),
                });
            }
        };

        // The record already exists; counter drift is only logged
        if let Err(e) = self.users.increment_posts(&author.id, 1).await {
            tracing::warn!(user = %author.id, error = %e, "failed to increment post count");
        }

        tracing::info!(image = %image.id, slug = %image.slug, bytes = stored.size_bytes, "image published");
        Ok(image)
    }

    /// Name and durably write the derived artifact.
    pub async fn store(&self, ctx: &BlobCtx, image: TranscodedImage) -> Result<StoredFile> {
        let token = ArtifactToken::generate();
        let put = BlobPut::new()
            .with_content_type(image.content_type.clone())
            .with_extension(image.extension.clone());

        let receipt = self
            .blobs
            .put_named(ctx, token, put, image.bytes.clone())
            .await
            .map_err(storage_failure)?;

        Ok(StoredFile {
            token: receipt.token,
            key: receipt.key,
            size_bytes: receipt.size_bytes,
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::adapters::memory_store::MemoryStore;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use pix_blob::{BlobConfig, BlobResult, BlobStore, ByteStream, MemoryBlobStore, PutResult};
    use pix_core::{AuthorWindow, ErrorKind, ImageId, NewUser, SetOp, User, UserId};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> UploadedArtifact {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 7]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        UploadedArtifact::accept("image/png", out.into_inner()).unwrap()
    }

    async fn author(store: &MemoryStore) -> User {
        store.insert(NewUser { username: "ansel".into() }).await.unwrap()
    }

    async fn images_by(store: &MemoryStore, user: &User) -> Vec<Image> {
        let window = AuthorWindow::new([user.id.clone()].into_iter().collect(), 12);
        store.list_by_authors(window).await.unwrap()
    }

    fn service(
        blobs: impl BlobStore + 'static,
        images: Arc<dyn ImageStore>,
        users: Arc<dyn UserStore>,
    ) -> UploadService {
        UploadService::new(
            Transcoder::default(),
            BlobAdapter::new(blobs, BlobConfig::default()),
            images,
            users,
        )
    }

    /// Blob store whose writes always fail.
    struct BrokenDisk;

    #[async_trait]
    impl BlobStore for BrokenDisk {
        async fn put(&self, _key: &str, _ct: Option<&str>, _stream: ByteStream) -> BlobResult<PutResult> {
            Err(BlobError::Io(std::io::Error::other("no space left on device")))
        }
        async fn delete(&self, key: &str) -> BlobResult<()> {
            Err(BlobError::not_found(key))
        }
    }

    /// Image store that refuses to create records.
    struct ReadOnlyImages(Arc<MemoryStore>);

    #[async_trait]
    impl ImageStore for ReadOnlyImages {
        async fn create(&self, _image: NewImage) -> Result<Image> {
            anyhow::bail!("write concern timed out")
        }
        async fn find_by_slug(&self, slug: &Slug) -> Result<Image> {
            self.0.find_by_slug(slug).await
        }
        async fn find_by_id(&self, id: &ImageId) -> Result<Image> {
            self.0.find_by_id(id).await
        }
        async fn list_by_authors(&self, window: AuthorWindow) -> Result<Vec<Image>> {
            self.0.list_by_authors(window).await
        }
        async fn update_liked_by(&self, id: &ImageId, user: &UserId, op: SetOp) -> Result<Image> {
            self.0.update_liked_by(id, user, op).await
        }
    }

    #[tokio::test]
    async fn publish_stores_file_then_record_then_counts() {
        let store = Arc::new(MemoryStore::new());
        let user = author(&store).await;
        let blobs = MemoryBlobStore::new();
        let uploads = service(blobs.clone(), store.clone(), store.clone());

        let image = uploads
            .publish(&Principal::from(&user), png(40, 30), "dusk".into(), Some("req-7"))
            .await
            .unwrap();

        assert_eq!(image.storage_path, format!("{}.png", image.slug));
        assert!(blobs.contains(&image.storage_path));
        assert_eq!(blobs.content_type(&image.storage_path).as_deref(), Some("image/png"));
        assert_eq!(store.get(&user.id).await.unwrap().posts, 1);
    }

    #[tokio::test]
    async fn failed_write_creates_no_record() {
        let store = Arc::new(MemoryStore::new());
        let user = author(&store).await;
        let uploads = service(BrokenDisk, store.clone(), store.clone());

        let err = uploads
            .publish(&Principal::from(&user), png(8, 8), String::new(), None)
            .await
            .unwrap_err();

        assert_eq!(PixError::kind_of(&err), Some(ErrorKind::PersistenceError));
        assert!(images_by(&store, &user).await.is_empty());
        assert_eq!(store.get(&user.id).await.unwrap().posts, 0);
    }

    #[tokio::test]
    async fn failed_record_discards_the_stored_file() {
        let store = Arc::new(MemoryStore::new());
        let user = author(&store).await;
        let blobs = MemoryBlobStore::new();
        let uploads = service(blobs.clone(), Arc::new(ReadOnlyImages(store.clone())), store.clone());

        let err = uploads
            .publish(&Principal::from(&user), png(8, 8), String::new(), None)
            .await
            .unwrap_err();

        assert_eq!(PixError::kind_of(&err), Some(ErrorKind::PersistenceError));
        assert!(blobs.is_empty());
        assert!(images_by(&store, &user).await.is_empty());
        assert_eq!(store.get(&user.id).await.unwrap().posts, 0);
    }
}
