/// `load_config` module: merges an optional static YAML file with environment
/// variables into the [`AppConfig`] used by the CLI.
///
/// The YAML file holds non-secret pipeline settings only. Storage credentials
/// always come from the environment (optionally populated from `.env`, and from
/// `.env.secret` when `DEBUG` is set).
///
/// # Precedence
/// environment > YAML file > built-in defaults, for the catalog host, bucket name
/// and public URL. The remaining pipeline settings are YAML-only.
///
/// # Errors
/// A missing `AWS_ENDPOINT`, `AWS_ACCESS_KEY` or `AWS_SECRET_KEY` is fatal, as is an
/// unreadable or invalid YAML file.
use anyhow::{Context, Result};
use gcmd_bucket_core::artifact::AcquisitionKind;
use gcmd_bucket_core::catalog::resolve_host;
use gcmd_bucket_core::config::SyncConfig;
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_BUCKET_NAME: &str = "nasa";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Object-storage connection settings, read from the environment only.
#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub storage: StorageConfig,
}

/// Non-secret settings accepted in the YAML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticConfig {
    catalog_host: Option<String>,
    bucket_name: Option<String>,
    strategy: Option<AcquisitionKind>,
    delay_secs: Option<f64>,
    index_title: Option<String>,
    public_base_url: Option<String>,
}

/// What [`load_env`] found on disk.
#[derive(Debug, Default)]
pub struct EnvFiles {
    pub dotenv: Option<PathBuf>,
    /// Set only when `DEBUG` is truthy.
    pub secrets: Option<Result<PathBuf, String>>,
}

impl EnvFiles {
    /// Log the outcome. Call once the tracing subscriber is installed.
    pub fn trace_loaded(&self) {
        match &self.dotenv {
            Some(path) => info!(path = ?path, "Loaded environment file"),
            None => debug!("No .env file found"),
        }
        match &self.secrets {
            Some(Ok(path)) => info!(path = ?path, "Loaded debug secrets file"),
            Some(Err(e)) => info!(error = %e, "No debug secrets file loaded"),
            None => {}
        }
    }
}

/// Load `.env`, and `.env.secret` as well when `DEBUG` is truthy.
///
/// Runs before logging is configured, so the outcome is returned rather than logged.
pub fn load_env() -> EnvFiles {
    let dotenv = dotenvy::dotenv().ok();
    let debug = std::env::var("DEBUG")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    let secrets = debug.then(|| dotenvy::from_filename(".env.secret").map_err(|e| e.to_string()));
    EnvFiles { dotenv, secrets }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_env(name: &str) -> Result<String> {
    env_var(name).ok_or_else(|| {
        error!(var = name, "Required environment variable not set");
        anyhow::anyhow!("{name} environment variable not set")
    })
}

fn read_static_config(path: &Path) -> Result<StaticConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let config_content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    match serde_yaml::from_str::<Option<StaticConfig>>(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(conf.unwrap_or_default())
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Public base URL of a bucket served in virtual-hosted style from `endpoint`.
pub fn default_public_url(endpoint: &str, bucket: &str) -> Result<String> {
    let url = Url::parse(endpoint).with_context(|| format!("AWS_ENDPOINT is not a valid URL: {endpoint}"))?;
    let host = url
        .host_str()
        .with_context(|| format!("AWS_ENDPOINT has no host: {endpoint}"))?;
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    Ok(format!("https://{bucket}.{host}{port}"))
}

/// Build the application configuration from an optional YAML file and the environment.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let static_conf = match path {
        Some(path) => read_static_config(path)?,
        None => StaticConfig::default(),
    };

    let endpoint = required_env("AWS_ENDPOINT")?;
    let access_key = required_env("AWS_ACCESS_KEY")?;
    let secret_key = required_env("AWS_SECRET_KEY")?;
    let region = env_var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());

    let bucket_name = env_var("AWS_BUCKET_NAME")
        .or(static_conf.bucket_name)
        .unwrap_or_else(|| DEFAULT_BUCKET_NAME.to_string());
    let catalog_host = resolve_host(env_var("API_HOST").or(static_conf.catalog_host).as_deref());
    let public_base_url = match env_var("BUCKET_PUBLIC_URL").or(static_conf.public_base_url) {
        Some(url) => url,
        None => default_public_url(&endpoint, &bucket_name)?,
    };

    let mut sync = SyncConfig::new(&bucket_name, &public_base_url);
    sync.catalog_host = catalog_host;
    if let Some(strategy) = static_conf.strategy {
        sync.strategy = strategy;
    }
    if let Some(secs) = static_conf.delay_secs {
        sync.delay = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("delay_secs must be a non-negative number, got {secs}"))?;
    }
    if let Some(title) = static_conf.index_title {
        sync.index_title = title;
    }

    let storage = StorageConfig {
        endpoint,
        region,
        access_key,
        secret_key,
        bucket_name,
    };

    info!(
        bucket = %storage.bucket_name,
        endpoint = %storage.endpoint,
        region = %storage.region,
        "Config loaded and merged successfully"
    );
    sync.trace_loaded();

    Ok(AppConfig { sync, storage })
}
