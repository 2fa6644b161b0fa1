use std::sync::Arc;

use bytes::Bytes;

use crate::{
    once_stream, ArtifactToken, BlobConfig, BlobCtx, BlobError, BlobPut, BlobReceipt, BlobResult,
    BlobStore, KeyLayout,
};

/// The blob adapter services embed: names artifacts, enforces size
/// limits and hands bytes to the configured store.
#[derive(Clone)]
pub struct BlobAdapter {
    store: Arc<dyn BlobStore>,
    keys: KeyLayout,
    config: BlobConfig,
}

impl BlobAdapter {
    pub fn new<S: BlobStore + 'static>(store: S, config: BlobConfig) -> Self {
        let keys = match &config.key_prefix {
            Some(prefix) => KeyLayout::with_prefix(prefix.clone()),
            None => KeyLayout::new(),
        };
        Self {
            store: Arc::new(store),
            keys,
            config,
        }
    }

    /// Store an artifact under a caller-chosen token.
    pub async fn put_named(
        &self,
        ctx: &BlobCtx,
        token: ArtifactToken,
        put: BlobPut,
        data: Bytes,
    ) -> BlobResult<BlobReceipt> {
        let size = data.len() as u64;
        if size > self.config.max_blob_bytes {
            return Err(BlobError::TooLarge {
                size,
                max: self.config.max_blob_bytes,
            });
        }

        let key = self.keys.object_key(token.as_str(), put.extension.as_deref());
        let result = self
            .store
            .put(&key, put.content_type.as_deref(), once_stream(data))
            .await?;

        tracing::info!(
            request_id = %ctx.request_id,
            actor = ctx.actor_id.as_deref().unwrap_or("-"),
            key = %key,
            bytes = result.size_bytes,
            "artifact stored"
        );

        let mut receipt = BlobReceipt::new(token, key, result.size_bytes);
        if let Some(ct) = put.content_type {
            receipt = receipt.with_content_type(ct);
        }
        Ok(receipt)
    }

    /// Remove a stored artifact, logging rather than failing on error.
    ///
    /// Used to roll back after a later pipeline stage fails.
    pub async fn discard(&self, ctx: &BlobCtx, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            tracing::warn!(request_id = %ctx.request_id, key, error = %e, "failed to discard artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBlobStore;

    #[tokio::test]
    async fn put_named_keys_blob_by_token_and_extension() {
        let store = MemoryBlobStore::new();
        let adapter = BlobAdapter::new(store.clone(), BlobConfig::default());

        let token = ArtifactToken::generate();

        let receipt = adapter
            .put_named(
                &BlobCtx::new(),
                token.clone(),
                BlobPut::new().with_content_type("image/png").with_extension("png"),
                Bytes::from_static(b"png"),
            )
            .await
            .unwrap();

        assert_eq!(receipt.token, token);
        assert_eq!(receipt.key, format!("{token}.png"));
        assert_eq!(receipt.size_bytes, 3);
        assert_eq!(store.content_type(&receipt.key).as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn oversized_artifacts_never_reach_the_store() {
        let store = MemoryBlobStore::new();
        let adapter = BlobAdapter::new(store.clone(), BlobConfig::new().with_max_blob_bytes(4));

        let err = adapter
            .put_named(&BlobCtx::new(), ArtifactToken::generate(), BlobPut::new(), Bytes::from_static(b"too big"))
            .await
            .unwrap_err();

        assert!(matches!(err, BlobError::TooLarge { size: 7, max: 4 }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn discard_removes_and_tolerates_missing() {
        let store = MemoryBlobStore::new();
        let adapter = BlobAdapter::new(store.clone(), BlobConfig::new().with_key_prefix("photos"));
        let ctx = BlobCtx::new();

        let receipt = adapter
            .put_named(&ctx, ArtifactToken::generate(), BlobPut::new().with_extension("gif"), Bytes::from_static(b"g"))
            .await
            .unwrap();
        assert!(receipt.key.starts_with("photos/"));

        adapter.discard(&ctx, &receipt.key).await;
        adapter.discard(&ctx, &receipt.key).await;
        assert!(store.is_empty());
    }
}
