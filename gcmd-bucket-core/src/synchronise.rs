//! High-level pipeline: orchestrates catalog listing → diff → acquire → upload → index.
//!
//! This module provides the top-level orchestration for one run of the job:
//!   - Lists all package identifiers in the catalog
//!   - Lists the identifiers already exported to the bucket
//!   - Acquires and uploads every missing package, one at a time, pausing a fixed
//!     delay between packages to go easy on the catalog API
//!   - Configures the bucket as a public static website and republishes `index.html`
//!     over the full catalog
//!
//! # Error Handling
//! A failed acquisition or upload of a single package is logged and recorded in the
//! [`SynchroniseReport`]; the package stays missing and is retried by the next run.
//! Catalog listing and bucket-level failures abort the run with a [`SyncError`].
//! The catalog is listed before the bucket is touched, so an unreadable catalog
//! never mutates the bucket.
//!
//! # Navigation
//! - Main entrypoint: [`run`]
//! - Reconciliation loop only: [`synchronise`]
//! - Dry run: [`plan`]

use std::collections::BTreeSet;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::catalog::{self, CatalogError};
use crate::config::SyncConfig;
use crate::contract::{
    export_key, ArtifactSource, BucketError, BucketStore, Fetcher, EXPORT_CONTENT_TYPE, INDEX_KEY,
};
use crate::index::render_index;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("catalog listing failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("bucket operation failed: {0}")]
    Bucket(#[from] BucketError),
}

/// A package that stayed missing this run, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPackage {
    pub package: String,
    pub reason: String,
}

/// Outcome of a run, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SynchroniseReport {
    /// Packages missing from the bucket at the start of the run, sorted.
    pub missing: Vec<String>,
    /// Packages uploaded this run.
    pub uploaded: Vec<String>,
    /// Packages whose acquisition or upload failed.
    pub skipped: Vec<SkippedPackage>,
    /// Key of the published index page, once uploaded.
    pub index_key: Option<String>,
}

/// Catalog identifiers that have no export in the bucket yet.
///
/// The result is a subset of `catalog` disjoint from `bucket`, ordered lexicographically.
pub fn missing_packages<I, S>(catalog: I, bucket: &BTreeSet<String>) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    catalog
        .into_iter()
        .map(|id| id.as_ref().to_string())
        .filter(|id| !bucket.contains(id))
        .collect()
}

/// Reconciliation loop: upload every catalog package missing from the bucket.
pub async fn synchronise<B, A>(
    config: &SyncConfig,
    catalog_ids: &[String],
    bucket: &B,
    source: &A,
) -> Result<SynchroniseReport, SyncError>
where
    B: BucketStore + ?Sized,
    A: ArtifactSource + ?Sized,
{
    let in_bucket = bucket.list_keys(true).await.map_err(|e| {
        error!(bucket = %config.bucket_name, error = %e, "[SYNC][ERROR] Failed to list bucket");
        e
    })?;
    let missing = missing_packages(catalog_ids, &in_bucket);
    info!(
        catalog = catalog_ids.len(),
        in_bucket = in_bucket.len(),
        missing = missing.len(),
        "[SYNC] Found missing packages in bucket"
    );

    let mut report = SynchroniseReport {
        missing: missing.iter().cloned().collect(),
        ..SynchroniseReport::default()
    };

    for (position, package) in missing.iter().enumerate() {
        if position > 0 {
            debug!(delay_secs = config.delay.as_secs_f64(), "[SYNC] Sleeping before next package");
            tokio::time::sleep(config.delay).await;
        }

        let artifact = match source.acquire(package).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(package = %package, error = %e, "[SYNC][ERROR] Could not acquire export, skipping");
                report.skipped.push(SkippedPackage {
                    package: package.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let key = export_key(package);
        match bucket.put(&key, artifact, EXPORT_CONTENT_TYPE).await {
            Ok(()) => {
                info!(package = %package, key = %key, "[SYNC][UPLOAD] Export uploaded");
                report.uploaded.push(package.clone());
            }
            Err(e) => {
                error!(package = %package, key = %key, error = %e, "[SYNC][ERROR][UPLOAD] Upload failed, skipping");
                report.skipped.push(SkippedPackage {
                    package: package.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if !report.skipped.is_empty() {
        warn!(
            skipped = report.skipped.len(),
            "[SYNC] Some packages remain missing until the next run"
        );
    }
    Ok(report)
}

/// Render the index page over `catalog_ids` and upload it as [`INDEX_KEY`].
pub async fn publish_index<B>(
    config: &SyncConfig,
    catalog_ids: &[String],
    bucket: &B,
) -> Result<String, SyncError>
where
    B: BucketStore + ?Sized,
{
    let html = render_index(&config.index_title, &config.public_base_url, catalog_ids);
    bucket
        .put(INDEX_KEY, Bytes::from(html), "text/html")
        .await
        .map_err(|e| {
            error!(key = INDEX_KEY, error = %e, "[SYNC][ERROR] Failed to publish index");
            e
        })?;
    info!(key = INDEX_KEY, entries = catalog_ids.len(), "[SYNC] Index published");
    Ok(INDEX_KEY.to_string())
}

/// Run the whole job once.
pub async fn run<F, B, A>(
    config: &SyncConfig,
    fetcher: &F,
    bucket: &B,
    source: &A,
) -> Result<SynchroniseReport, SyncError>
where
    F: Fetcher + ?Sized,
    B: BucketStore + ?Sized,
    A: ArtifactSource + ?Sized,
{
    info!(bucket = %config.bucket_name, strategy = %config.strategy, "[SYNC] Starting synchronisation");

    let catalog_ids = catalog::list_packages(fetcher, &config.catalog_host).await?;

    bucket.ensure_exists().await.map_err(|e| {
        error!(bucket = %config.bucket_name, error = %e, "[SYNC][ERROR] Bucket unavailable");
        e
    })?;

    let mut report = synchronise(config, &catalog_ids, bucket, source).await?;

    bucket.configure_public_static_site().await.map_err(|e| {
        error!(bucket = %config.bucket_name, error = %e, "[SYNC][ERROR] Failed to configure static website");
        e
    })?;
    report.index_key = Some(publish_index(config, &catalog_ids, bucket).await?);

    info!(
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        "[SYNC] Finished synchronisation"
    );
    Ok(report)
}

/// Dry run: list what would be uploaded without touching the bucket.
pub async fn plan<F, B>(config: &SyncConfig, fetcher: &F, bucket: &B) -> Result<Vec<String>, SyncError>
where
    F: Fetcher + ?Sized,
    B: BucketStore + ?Sized,
{
    let catalog_ids = catalog::list_packages(fetcher, &config.catalog_host).await?;
    let in_bucket = bucket.list_keys(true).await?;
    let missing: Vec<String> = missing_packages(&catalog_ids, &in_bucket).into_iter().collect();
    info!(missing = missing.len(), "[SYNC] Dry run complete");
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{AcquireError, FetchError, MockArtifactSource, MockBucketStore};
    use std::time::Duration;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn config() -> SyncConfig {
        let mut config = SyncConfig::new("nasa", "https://nasa.s3.example.org");
        config.delay = Duration::ZERO;
        config
    }

    #[test]
    fn missing_is_catalog_minus_bucket() {
        let catalog = ids(&["c", "a", "b"]);
        let bucket = set(&["a", "orphan"]);
        let missing = missing_packages(&catalog, &bucket);
        assert_eq!(missing, set(&["b", "c"]));
        assert!(missing.iter().all(|m| catalog.contains(m)));
        assert!(missing.is_disjoint(&bucket));
    }

    #[tokio::test]
    async fn upload_failure_does_not_stop_the_loop() {
        let mut bucket = MockBucketStore::new();
        bucket.expect_list_keys().returning(|_| Ok(BTreeSet::new()));
        bucket.expect_put().times(2).returning(|key, _, _| {
            if key == "a.xml" {
                Err(BucketError::Upload {
                    key: key.to_string(),
                    reason: "503".to_string(),
                })
            } else {
                Ok(())
            }
        });

        let mut source = MockArtifactSource::new();
        source
            .expect_acquire()
            .times(2)
            .returning(|_| Ok(Bytes::from_static(b"<DIF/>")));

        let report = synchronise(&config(), &ids(&["a", "b"]), &bucket, &source)
            .await
            .unwrap();
        assert_eq!(report.uploaded, ids(&["b"]));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].package, "a");
    }

    #[tokio::test]
    async fn acquisition_failure_skips_upload() {
        let mut bucket = MockBucketStore::new();
        bucket.expect_list_keys().returning(|_| Ok(BTreeSet::new()));
        bucket.expect_put().never();

        let mut source = MockArtifactSource::new();
        source.expect_acquire().returning(|package| {
            Err(AcquireError::Fetch(FetchError::Transport {
                url: format!("https://www.envidat.ch/dataset/{package}/export/gcmd_dif.xml"),
                reason: "connection reset".to_string(),
            }))
        });

        let report = synchronise(&config(), &ids(&["a"]), &bucket, &source)
            .await
            .unwrap();
        assert!(report.uploaded.is_empty());
        assert_eq!(report.skipped[0].package, "a");
    }

    #[tokio::test]
    async fn bucket_listing_failure_is_fatal() {
        let mut bucket = MockBucketStore::new();
        bucket.expect_list_keys().returning(|_| {
            Err(BucketError::Access {
                bucket: "nasa".to_string(),
                reason: "403 Forbidden".to_string(),
            })
        });
        let mut source = MockArtifactSource::new();
        source.expect_acquire().never();

        let err = synchronise(&config(), &ids(&["a"]), &bucket, &source)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Bucket(BucketError::Access { .. })));
    }

    #[tokio::test]
    async fn index_is_uploaded_as_html() {
        let mut bucket = MockBucketStore::new();
        bucket
            .expect_put()
            .withf(|key: &str, body: &Bytes, content_type: &str| {
                key == "index.html"
                    && content_type == "text/html"
                    && std::str::from_utf8(body).unwrap().contains("nasa.s3.example.org/a.xml")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let key = publish_index(&config(), &ids(&["a"]), &bucket).await.unwrap();
        assert_eq!(key, "index.html");
    }
}
