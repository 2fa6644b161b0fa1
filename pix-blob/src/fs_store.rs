use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::store::validate_key;
use crate::{BlobError, BlobResult, BlobStore, ByteStream, PutResult};

/// Blob store rooted at a directory on the local filesystem.
///
/// Writes go to a `.part` sibling first and are renamed into place after
/// `sync_all`, so a reader never observes a partially written file under
/// the final name.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> BlobResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    async fn write_temp(temp_path: &Path, mut stream: ByteStream) -> BlobResult<u64> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp_path)
            .await?;

        let mut total = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(total)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        key: &str,
        _content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult> {
        let final_path = self.path_for(key)?;
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if tokio::fs::try_exists(&final_path).await? {
            return Err(BlobError::already_exists(key));
        }

        let temp_path = final_path.with_file_name(format!(
            ".{}.{}.part",
            final_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("blob"),
            uuid::Uuid::new_v4().simple()
        ));

        let written = match Self::write_temp(&temp_path, stream).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                    tracing::warn!(path = %temp_path.display(), error = %cleanup, "failed to remove partial blob");
                }
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(key, bytes = written, "blob written");

        Ok(PutResult { size_bytes: written })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::once_stream;

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn put_writes_exactly_the_streamed_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        let store = FsBlobStore::new(&root);

        let put = store
            .put("abc.jpeg", Some("image/jpeg"), once_stream(&b"jpegdata"[..]))
            .await
            .unwrap();
        assert_eq!(put.size_bytes, 8);
        assert_eq!(std::fs::read(root.join("abc.jpeg")).unwrap(), b"jpegdata");
    }

    #[tokio::test]
    async fn put_leaves_no_partial_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("a.png", None, once_stream(&b"x"[..])).await.unwrap();
        assert_eq!(names(dir.path()), vec!["a.png".to_string()]);
    }

    #[tokio::test]
    async fn failed_stream_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let broken: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(bytes::Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client went away")),
        ]));

        assert!(store.put("b.png", None, broken).await.is_err());
        assert!(names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn existing_keys_are_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("c.gif", None, once_stream(&b"one"[..])).await.unwrap();
        let err = store
            .put("c.gif", None, once_stream(&b"two"[..]))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::AlreadyExists { .. }));
        assert_eq!(std::fs::read(dir.path().join("c.gif")).unwrap(), b"one");
    }

    #[tokio::test]
    async fn delete_removes_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("d.png", None, once_stream(&b"d"[..])).await.unwrap();
        store.delete("d.png").await.unwrap();
        assert!(names(dir.path()).is_empty());

        assert!(store.delete("d.png").await.unwrap_err().is_not_found());
        assert!(matches!(
            store.put("../escape.png", None, once_stream(&b"e"[..])).await,
            Err(BlobError::InvalidKey(_))
        ));
    }
}
