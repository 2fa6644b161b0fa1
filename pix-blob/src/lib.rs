//! # pix-blob: artifact storage for Pixgram
//!
//! `pix-blob` names and stores the binary artifacts produced by the upload
//! pipeline. Services never pick file names themselves: every artifact is
//! named by a random [`ArtifactToken`] and written through a [`BlobStore`].
//!
//! ```text
//! ┌─────────────────┐
//! │   Your Service  │  ← Business logic only
//! ├─────────────────┤
//! │   BlobAdapter   │  ← Naming, size limits
//! ├─────────────────┤
//! │   BlobStore     │  ← Filesystem / memory
//! └─────────────────┘
//! ```
//!
//! ```rust,no_run
//! use pix_blob::prelude::*;
//!
//! # async fn run() -> BlobResult<()> {
//! let adapter = BlobAdapter::new(FsBlobStore::new("public/uploads"), BlobConfig::default());
//!
//! let receipt = adapter
//!     .put_named(
//!         &BlobCtx::new().with_request_id("req-1"),
//!         ArtifactToken::generate(),
//!         BlobPut::new().with_content_type("image/jpeg").with_extension("jpeg"),
//!         bytes::Bytes::from_static(b"..."),
//!     )
//!     .await?;
//!
//! println!("stored at {}", receipt.key);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod config;
mod error;
mod fs_store;
mod memory_store;
mod receipt;
pub mod store;
mod types;

pub use adapter::BlobAdapter;
pub use config::BlobConfig;
pub use error::{BlobError, BlobResult};
pub use fs_store::FsBlobStore;
pub use memory_store::MemoryBlobStore;
pub use receipt::BlobReceipt;
pub use store::{BlobStore, KeyLayout, PutResult};
pub use types::{once_stream, ArtifactToken, BlobCtx, BlobPut, ByteStream};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ArtifactToken, BlobAdapter, BlobConfig, BlobCtx, BlobError, BlobPut, BlobReceipt,
        BlobResult, BlobStore, FsBlobStore, MemoryBlobStore,
    };
}
