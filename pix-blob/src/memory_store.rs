use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use parking_lot::RwLock;

use crate::store::validate_key;
use crate::{BlobError, BlobResult, BlobStore, ByteStream, PutResult};

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: Option<String>,
}

/// In-process blob store, used by tests and ephemeral setups.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, StoredBlob>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.read().contains_key(key)
    }

    pub fn bytes(&self, key: &str) -> Option<Bytes> {
        self.blobs.read().get(key).map(|b| b.data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.blobs.read().get(key).and_then(|b| b.content_type.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        mut stream: ByteStream,
    ) -> BlobResult<PutResult> {
        validate_key(key)?;

        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let data = buf.freeze();
        let size_bytes = data.len() as u64;

        let mut blobs = self.blobs.write();
        if blobs.contains_key(key) {
            return Err(BlobError::already_exists(key));
        }
        blobs.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.map(str::to_string),
            },
        );

        Ok(PutResult { size_bytes })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.blobs
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BlobError::not_found(key))
    }
}
