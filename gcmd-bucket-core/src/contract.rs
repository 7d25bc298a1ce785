//! # contract: seams between the pipeline and the outside world
//!
//! This module defines the three traits the reconciliation loop is written against,
//! together with the error types each of them returns:
//!
//! - [`Fetcher`]: a plain HTTP GET against the catalog.
//! - [`BucketStore`]: the object-storage bucket that receives the exports.
//! - [`ArtifactSource`]: how the XML export for a single package is obtained.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall` so tests can generate deterministic mocks.
//! - [`crate::memory::MemoryBucket`] is a full in-memory [`BucketStore`] for tests
//!   that need real list/put behaviour rather than expectations.
//!
//! ## Error policy
//! - [`FetchError`] and per-item [`BucketError`]s from `put` are recoverable: the
//!   loop logs them and moves on.
//! - [`BucketError`]s from `ensure_exists`, `list_keys` and
//!   `configure_public_static_site` abort the run.

use std::collections::BTreeSet;

use async_trait::async_trait;
use bytes::Bytes;
use mockall::automock;
use thiserror::Error;

/// File extension used for exported package records in the bucket.
pub const EXPORT_EXTENSION: &str = ".xml";

/// Content type used when uploading package exports.
pub const EXPORT_CONTENT_TYPE: &str = "application/xml";

/// Object key of the generated index page.
pub const INDEX_KEY: &str = "index.html";

/// Bucket object key for a package identifier.
pub fn export_key(package: &str) -> String {
    format!("{package}{EXPORT_EXTENSION}")
}

/// Failure of a single HTTP GET.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {reason}")]
    Transport { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. } | FetchError::Transport { url, .. } => url,
        }
    }
}

/// Errors raised by a [`BucketStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BucketError {
    #[error("bucket {bucket} is not accessible: {reason}")]
    Access { bucket: String, reason: String },

    #[error("failed to upload {key}: {reason}")]
    Upload { key: String, reason: String },

    #[error("failed to read {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("failed to configure bucket {bucket}: {reason}")]
    Configure { bucket: String, reason: String },
}

/// Errors raised while producing the XML export for a package.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("catalog returned unusable metadata for {package}: {reason}")]
    Metadata { package: String, reason: String },

    #[error(transparent)]
    Convert(#[from] crate::dif::ConvertError),
}

/// Performs HTTP GET requests against the catalog.
///
/// Implementations must never panic on network failure; every failure is
/// reported as a [`FetchError`] so that a single bad response cannot abort a batch.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the raw response body.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Object-storage bucket receiving the exported records and the index page.
///
/// The trait is implemented by the S3 client in the CLI crate, by
/// [`crate::memory::MemoryBucket`], and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Create the bucket if it does not exist yet.
    async fn ensure_exists(&self) -> Result<(), BucketError>;

    /// List every object key in the bucket.
    ///
    /// With `names_only`, only keys ending in [`EXPORT_EXTENSION`] are returned,
    /// with the extension stripped, yielding bare package identifiers.
    async fn list_keys(&self, names_only: bool) -> Result<BTreeSet<String>, BucketError>;

    /// Read an object into memory. Returns `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BucketError>;

    /// Upload `data` under `key`, overwriting any existing object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), BucketError>;

    /// Grant public read access and enable static-website hosting with
    /// [`INDEX_KEY`] as the index document. Safe to call repeatedly.
    async fn configure_public_static_site(&self) -> Result<(), BucketError>;
}

/// Strategy producing the XML export artifact of one package.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Produce the XML export for `package`.
    async fn acquire(&self, package: &str) -> Result<Bytes, AcquireError>;
}
