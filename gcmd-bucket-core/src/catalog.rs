//! CKAN catalog access: package listing and single-package metadata.
//!
//! Listing failures are fatal for a run. An empty or unreadable package list
//! would make every bucket object look orphaned, so [`list_packages`] never
//! degrades to an empty result.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::contract::{FetchError, Fetcher};

/// Catalog host used when none is configured.
pub const DEFAULT_CATALOG_HOST: &str = "https://www.envidat.ch";

const PACKAGE_LIST_PATH: &str = "/api/3/action/package_list";
const PACKAGE_SHOW_PATH: &str = "/api/3/action/package_show";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("catalog response from {url} is not valid JSON: {reason}")]
    InvalidJson { url: String, reason: String },

    #[error("catalog response from {url} has no usable \"result\": {reason}")]
    UnexpectedShape { url: String, reason: String },

    #[error("catalog reported failure for {url}")]
    Unsuccessful { url: String },
}

/// Normalise a configured host, falling back to [`DEFAULT_CATALOG_HOST`].
pub fn resolve_host(host: Option<&str>) -> String {
    match host.map(str::trim) {
        Some(h) if !h.is_empty() => h.trim_end_matches('/').to_string(),
        _ => DEFAULT_CATALOG_HOST.to_string(),
    }
}

pub fn package_list_url(host: &str) -> String {
    format!("{}{PACKAGE_LIST_PATH}", resolve_host(Some(host)))
}

pub fn package_show_url(host: &str, package: &str) -> String {
    format!("{}{PACKAGE_SHOW_PATH}?id={package}", resolve_host(Some(host)))
}

/// CKAN action API envelope. `success` is absent in some proxies' responses,
/// so only an explicit `false` is treated as failure.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: Option<bool>,
    result: Option<T>,
}

fn parse_envelope<T>(url: &str, body: &[u8]) -> Result<T, CatalogError>
where
    T: serde::de::DeserializeOwned,
{
    let envelope: Envelope<serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| CatalogError::InvalidJson {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if envelope.success == Some(false) {
        return Err(CatalogError::Unsuccessful {
            url: url.to_string(),
        });
    }

    let result = envelope.result.ok_or_else(|| CatalogError::UnexpectedShape {
        url: url.to_string(),
        reason: "missing key".to_string(),
    })?;

    serde_json::from_value(result).map_err(|e| CatalogError::UnexpectedShape {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// List every package identifier known to the catalog at `host`.
pub async fn list_packages<F>(fetcher: &F, host: &str) -> Result<Vec<String>, CatalogError>
where
    F: Fetcher + ?Sized,
{
    let url = package_list_url(host);
    info!(url = %url, "Listing catalog packages");

    let body = fetcher.fetch(&url).await.map_err(|e| {
        error!(url = %url, error = %e, "Catalog package list unavailable");
        CatalogError::from(e)
    })?;

    let packages: Vec<String> = parse_envelope(&url, &body).map_err(|e| {
        error!(url = %url, error = %e, "Catalog package list is malformed");
        e
    })?;

    info!(count = packages.len(), "Catalog packages listed");
    Ok(packages)
}

/// Fetch the full metadata record of one package.
pub async fn package_show<F>(
    fetcher: &F,
    host: &str,
    package: &str,
) -> Result<serde_json::Value, CatalogError>
where
    F: Fetcher + ?Sized,
{
    let url = package_show_url(host, package);
    debug!(url = %url, package, "Fetching package metadata");
    let body = fetcher.fetch(&url).await?;
    let record: serde_json::Value = parse_envelope(&url, &body)?;
    if !record.is_object() {
        return Err(CatalogError::UnexpectedShape {
            url,
            reason: "result is not an object".to_string(),
        });
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockFetcher;
    use bytes::Bytes;

    fn fetcher_returning(body: &'static str) -> MockFetcher {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .returning(move |_| Ok(Bytes::from_static(body.as_bytes())));
        fetcher
    }

    #[test]
    fn resolve_host_falls_back_to_default() {
        assert_eq!(resolve_host(None), DEFAULT_CATALOG_HOST);
        assert_eq!(resolve_host(Some("  ")), DEFAULT_CATALOG_HOST);
        assert_eq!(
            resolve_host(Some("https://catalog.example.org/")),
            "https://catalog.example.org"
        );
    }

    #[test]
    fn urls_follow_ckan_action_api() {
        assert_eq!(
            package_list_url("https://www.envidat.ch"),
            "https://www.envidat.ch/api/3/action/package_list"
        );
        assert_eq!(
            package_show_url("", "snow-depth"),
            "https://www.envidat.ch/api/3/action/package_show?id=snow-depth"
        );
    }

    #[tokio::test]
    async fn list_packages_reads_result_array() {
        let fetcher = fetcher_returning(r#"{"success": true, "result": ["a", "b", "c"]}"#);
        let packages = list_packages(&fetcher, DEFAULT_CATALOG_HOST).await.unwrap();
        assert_eq!(packages, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn list_packages_requests_package_list_endpoint() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url: &str| url == "https://catalog.test/api/3/action/package_list")
            .times(1)
            .returning(|_| Ok(Bytes::from_static(br#"{"result": []}"#)));
        let packages = list_packages(&fetcher, "https://catalog.test").await.unwrap();
        assert!(packages.is_empty());
    }

    #[tokio::test]
    async fn missing_result_key_is_fatal() {
        let fetcher = fetcher_returning(r#"{"unexpected": []}"#);
        let err = list_packages(&fetcher, DEFAULT_CATALOG_HOST).await.unwrap_err();
        assert!(matches!(err, CatalogError::UnexpectedShape { .. }), "{err}");
    }

    #[tokio::test]
    async fn non_string_entries_are_fatal() {
        let fetcher = fetcher_returning(r#"{"result": [1, 2]}"#);
        let err = list_packages(&fetcher, DEFAULT_CATALOG_HOST).await.unwrap_err();
        assert!(matches!(err, CatalogError::UnexpectedShape { .. }));
    }

    #[tokio::test]
    async fn invalid_json_is_fatal() {
        let fetcher = fetcher_returning("<html>maintenance</html>");
        let err = list_packages(&fetcher, DEFAULT_CATALOG_HOST).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidJson { .. }));
    }

    #[tokio::test]
    async fn fetch_failure_is_fatal_for_listing() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().returning(|url| {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            })
        });
        let err = list_packages(&fetcher, DEFAULT_CATALOG_HOST).await.unwrap_err();
        assert!(matches!(err, CatalogError::Fetch(FetchError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn package_show_rejects_unsuccessful_envelope() {
        let fetcher = fetcher_returning(r#"{"success": false, "error": {"message": "Not found"}}"#);
        let err = package_show(&fetcher, DEFAULT_CATALOG_HOST, "nope").await.unwrap_err();
        assert!(matches!(err, CatalogError::Unsuccessful { .. }));
    }

    #[tokio::test]
    async fn package_show_returns_record_object() {
        let fetcher = fetcher_returning(r#"{"success": true, "result": {"name": "snow-depth"}}"#);
        let record = package_show(&fetcher, DEFAULT_CATALOG_HOST, "snow-depth")
            .await
            .unwrap();
        assert_eq!(record["name"], "snow-depth");
    }
}
