#![doc = "gcmd-bucket-core: core logic library for gcmd-bucket."]

//! This crate contains the catalog client, the artifact acquisition strategies,
//! the reconciliation loop and the index generator for gcmd-bucket.
//! Object-storage credentials and the concrete S3 client live in the CLI crate.
//!
//! # Usage
//! Build a [`config::SyncConfig`], pick a [`contract::Fetcher`], a
//! [`contract::BucketStore`] and an [`contract::ArtifactSource`], then call
//! [`synchronise::run`].

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod contract;
pub mod dif;
pub mod fetch;
pub mod index;
pub mod memory;
pub mod synchronise;
