use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifact::AcquisitionKind;
use crate::catalog::DEFAULT_CATALOG_HOST;
use crate::index::DEFAULT_INDEX_TITLE;

/// Delay between two processed packages.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Pipeline settings shared by the CLI and tests. Contains no secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub catalog_host: String,
    pub bucket_name: String,
    pub strategy: AcquisitionKind,
    #[serde(rename = "delay_secs", with = "delay_secs")]
    pub delay: Duration,
    pub index_title: String,
    /// Base URL under which bucket objects are publicly reachable.
    pub public_base_url: String,
}

impl SyncConfig {
    pub fn new(bucket_name: &str, public_base_url: &str) -> Self {
        Self {
            catalog_host: DEFAULT_CATALOG_HOST.to_string(),
            bucket_name: bucket_name.to_string(),
            strategy: AcquisitionKind::default(),
            delay: DEFAULT_DELAY,
            index_title: DEFAULT_INDEX_TITLE.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            catalog_host = %self.catalog_host,
            bucket = %self.bucket_name,
            strategy = %self.strategy,
            delay_secs = self.delay.as_secs_f64(),
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

mod delay_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(delay.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_envidat_job() {
        let config = SyncConfig::new("nasa", "https://nasa.s3.example.org/");
        assert_eq!(config.catalog_host, "https://www.envidat.ch");
        assert_eq!(config.delay, Duration::from_secs(5));
        assert_eq!(config.strategy, AcquisitionKind::RemoteExport);
        assert_eq!(config.public_base_url, "https://nasa.s3.example.org");
    }

    #[test]
    fn delay_serializes_as_delay_secs() {
        let config = SyncConfig::new("nasa", "https://x");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["delay_secs"], 5.0);
        assert!(json.get("delay").is_none());
        assert_eq!(json["strategy"], "remote_export");

        let mut json = json;
        json["delay_secs"] = serde_json::json!(0.5);
        let parsed: SyncConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.delay, Duration::from_millis(500));
    }
}
