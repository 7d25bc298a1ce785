//! Artifact acquisition strategies.
//!
//! A package's XML export is either downloaded pre-rendered from the catalog's
//! export endpoint ([`RemoteExport`]) or built locally from its `package_show`
//! metadata ([`LocalConversion`]). Both implement [`ArtifactSource`] so the
//! reconciliation loop does not care which one is configured.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{self, resolve_host, CatalogError};
use crate::contract::{AcquireError, ArtifactSource, Fetcher};
use crate::dif;

/// Types/kinds of acquisition strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionKind {
    /// Download `{host}/dataset/{id}/export/gcmd_dif.xml`.
    #[default]
    RemoteExport,
    /// Fetch `package_show` metadata and convert it to DIF locally.
    LocalConversion,
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionKind::RemoteExport => f.write_str("remote_export"),
            AcquisitionKind::LocalConversion => f.write_str("local_conversion"),
        }
    }
}

impl FromStr for AcquisitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote_export" | "remote-export" | "RemoteExport" | "export" => {
                Ok(AcquisitionKind::RemoteExport)
            }
            "local_conversion" | "local-conversion" | "LocalConversion" | "convert" => {
                Ok(AcquisitionKind::LocalConversion)
            }
            other => Err(format!("unknown acquisition strategy: {other}")),
        }
    }
}

pub fn export_url(host: &str, package: &str) -> String {
    format!("{}/dataset/{package}/export/gcmd_dif.xml", resolve_host(Some(host)))
}

/// Downloads the catalog's own DIF export for each package.
pub struct RemoteExport {
    fetcher: Arc<dyn Fetcher>,
    host: String,
}

impl RemoteExport {
    pub fn new(fetcher: Arc<dyn Fetcher>, host: &str) -> Self {
        Self {
            fetcher,
            host: resolve_host(Some(host)),
        }
    }
}

#[async_trait]
impl ArtifactSource for RemoteExport {
    async fn acquire(&self, package: &str) -> Result<Bytes, AcquireError> {
        let url = export_url(&self.host, package);
        debug!(package, url = %url, "Downloading remote DIF export");
        let body = self.fetcher.fetch(&url).await?;
        if body.is_empty() {
            warn!(package, url = %url, "Remote DIF export is empty");
            return Err(AcquireError::Metadata {
                package: package.to_string(),
                reason: "empty export body".to_string(),
            });
        }
        Ok(body)
    }
}

/// Builds DIF XML locally from `package_show` metadata.
pub struct LocalConversion {
    fetcher: Arc<dyn Fetcher>,
    host: String,
}

impl LocalConversion {
    pub fn new(fetcher: Arc<dyn Fetcher>, host: &str) -> Self {
        Self {
            fetcher,
            host: resolve_host(Some(host)),
        }
    }
}

#[async_trait]
impl ArtifactSource for LocalConversion {
    async fn acquire(&self, package: &str) -> Result<Bytes, AcquireError> {
        let record = match catalog::package_show(self.fetcher.as_ref(), &self.host, package).await {
            Ok(record) => record,
            Err(CatalogError::Fetch(e)) => return Err(AcquireError::Fetch(e)),
            Err(e) => {
                return Err(AcquireError::Metadata {
                    package: package.to_string(),
                    reason: e.to_string(),
                })
            }
        };
        let xml = dif::to_dif_xml(&record, &self.host)?;
        debug!(package, bytes = xml.len(), "Converted package metadata to DIF");
        Ok(Bytes::from(xml))
    }
}

/// Build the configured strategy around a shared fetcher.
pub fn artifact_source(
    kind: AcquisitionKind,
    fetcher: Arc<dyn Fetcher>,
    host: &str,
) -> Box<dyn ArtifactSource> {
    match kind {
        AcquisitionKind::RemoteExport => Box::new(RemoteExport::new(fetcher, host)),
        AcquisitionKind::LocalConversion => Box::new(LocalConversion::new(fetcher, host)),
    }
}
