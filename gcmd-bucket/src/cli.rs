//! # gcmd-bucket CLI
//!
//! Command parsing and orchestration for the `gcmd-bucket` binary. The
//! reconciliation logic itself lives in [`gcmd_bucket_core::synchronise`]; this
//! module wires configuration, the HTTP fetcher and the S3 bucket together.
//!
//! - For command-line users: `gcmd-bucket --help`.
//! - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gcmd_bucket_core::artifact::{artifact_source, AcquisitionKind};
use gcmd_bucket_core::contract::Fetcher;
use gcmd_bucket_core::fetch::{HttpFetcher, DEFAULT_TIMEOUT};
use gcmd_bucket_core::synchronise;

use crate::bucket::S3Bucket;
use crate::load_config::load_config;

/// CLI for gcmd-bucket: publish catalog records as GCMD DIF XML.
#[derive(Parser)]
#[clap(
    name = "gcmd-bucket",
    version,
    about = "Synchronise EnviDat catalog records into an S3 bucket as GCMD DIF XML"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload every catalog package missing from the bucket, then publish the index page
    Sync {
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// How exports are obtained: remote_export or local_conversion
        #[clap(long)]
        strategy: Option<AcquisitionKind>,
        /// Only report which packages are missing; do not modify the bucket
        #[clap(long)]
        dry_run: bool,
    },
}

/// Async CLI entrypoint shared by main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            strategy,
            dry_run,
        } => {
            let mut app = load_config(config.as_deref())?;
            if let Some(strategy) = strategy {
                tracing::info!(%strategy, "Strategy overridden on the command line");
                app.sync.strategy = strategy;
            }

            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(DEFAULT_TIMEOUT)?);
            let bucket = S3Bucket::from_config(&app.storage)?;

            if dry_run {
                tracing::info!(command = "sync", "Starting dry run");
                let missing = synchronise::plan(&app.sync, fetcher.as_ref(), &bucket).await?;
                for package in &missing {
                    println!("{package}");
                }
                tracing::info!(command = "sync", missing = missing.len(), "Dry run complete");
                return Ok(());
            }

            tracing::info!(command = "sync", "Starting synchronisation process");
            let source = artifact_source(app.sync.strategy, fetcher.clone(), &app.sync.catalog_host);
            match synchronise::run(&app.sync, fetcher.as_ref(), &bucket, source.as_ref()).await {
                Ok(report) => {
                    tracing::info!(command = "sync", ?report, "Synchronisation complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(e.into())
                }
            }
        }
    }
}
