//! # absterco-blob
//!
//! Storage for blog images: a path-addressed [`BlobStore`] behind a
//! [`BlobStorage`] facade that turns uploads into public URLs and URLs back
//! into storage paths, plus the image [`compress`] pipeline run before upload.
//!
//! ```text
//! ┌──────────────────┐
//! │ LifecycleManager │  ← decides when images are uploaded / deleted
//! ├──────────────────┤
//! │   BlobStorage    │  ← path convention + URL contract
//! ├──────────────────┤
//! │    BlobStore     │  ← memory or S3-compatible backend
//! └──────────────────┘
//! ```

pub mod compress;
mod config;
mod error;
mod memory_store;
mod s3_store;
pub mod storage;
pub mod store;

pub use compress::{
    compress, has_transparency, smart_compress, CompressError, CompressionOptions,
    CompressionResult, ImageFile, OutputFormat,
};
pub use config::BlobConfig;
pub use error::{BlobError, BlobResult};
pub use memory_store::MemoryBlobStore;
pub use s3_store::{S3CompatibleStore, S3Config};
pub use storage::{BlobStorage, UploadedBlob};
pub use store::{BlobStore, ObjectHead, PutResult};
