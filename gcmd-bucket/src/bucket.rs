#![doc = "S3 implementation of the core `BucketStore` trait."]
//
//! # S3 bucket adapter
//!
//! Object operations (list, get, put) go through `object_store`'s `AmazonS3`.
//! Bucket-level operations that `object_store` does not expose (create bucket,
//! bucket policy, website configuration) go through `aws-sdk-s3`. Both clients are
//! built from the same [`StorageConfig`] and talk to the same endpoint.
//!
//! - Construct [`S3Bucket`] with [`S3Bucket::from_config`]; no network calls happen
//!   until a trait method is awaited.
//! - See [`gcmd_bucket_core::contract::BucketStore`] for the error contract.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, IndexDocument, WebsiteConfiguration,
};
use bytes::Bytes;
use futures::TryStreamExt;
use gcmd_bucket_core::contract::{BucketError, BucketStore, EXPORT_EXTENSION, INDEX_KEY};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectMeta, ObjectStore, PutOptions, PutPayload,
};

use crate::load_config::{StorageConfig, DEFAULT_REGION};

/// Bucket policy granting anonymous read access to every object.
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicRead",
            "Effect": "Allow",
            "Principal": "*",
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{bucket}/*")]
        }]
    })
    .to_string()
}

pub struct S3Bucket {
    bucket: String,
    region: String,
    store: Arc<dyn ObjectStore>,
    control: aws_sdk_s3::Client,
}

impl S3Bucket {
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let store = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket_name)
            .with_region(&config.region)
            .with_endpoint(&config.endpoint)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_allow_http(config.endpoint.starts_with("http://"))
            .build()
            .context("Failed to build object store client")?;

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "gcmd-bucket-env",
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        tracing::info!(
            bucket = %config.bucket_name,
            endpoint = %config.endpoint,
            "Initialized S3 bucket client"
        );

        Ok(Self {
            bucket: config.bucket_name.clone(),
            region: config.region.clone(),
            store: Arc::new(store),
            control: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    fn access_error(&self, reason: impl ToString) -> BucketError {
        BucketError::Access {
            bucket: self.bucket.clone(),
            reason: reason.to_string(),
        }
    }

    fn configure_error(&self, reason: impl ToString) -> BucketError {
        BucketError::Configure {
            bucket: self.bucket.clone(),
            reason: reason.to_string(),
        }
    }

    async fn create_bucket(&self) -> Result<(), BucketError> {
        let mut request = self.control.create_bucket().bucket(&self.bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket, "Created bucket");
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_bucket_already_owned_by_you())
                    .unwrap_or(false) =>
            {
                tracing::debug!(bucket = %self.bucket, "Bucket already owned by us");
                Ok(())
            }
            Err(e) => {
                tracing::error!(bucket = %self.bucket, error = %DisplayErrorContext(&e), "Failed to create bucket");
                Err(self.access_error(DisplayErrorContext(&e)))
            }
        }
    }
}

#[async_trait]
impl BucketStore for S3Bucket {
    async fn ensure_exists(&self) -> Result<(), BucketError> {
        match self.control.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                tracing::debug!(bucket = %self.bucket, "Bucket exists");
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false) =>
            {
                tracing::info!(bucket = %self.bucket, "Bucket not found, creating it");
                self.create_bucket().await
            }
            Err(e) => {
                tracing::error!(bucket = %self.bucket, error = %DisplayErrorContext(&e), "Bucket is not accessible");
                Err(self.access_error(DisplayErrorContext(&e)))
            }
        }
    }

    async fn list_keys(&self, names_only: bool) -> Result<BTreeSet<String>, BucketError> {
        let objects: Vec<ObjectMeta> = self.store.list(None).try_collect().await.map_err(|e| {
            tracing::error!(bucket = %self.bucket, error = %e, "Failed to list bucket objects");
            self.access_error(e)
        })?;

        let keys: BTreeSet<String> = objects
            .iter()
            .map(|meta| meta.location.as_ref())
            .filter_map(|key| {
                if names_only {
                    key.strip_suffix(EXPORT_EXTENSION)
                } else {
                    Some(key)
                }
            })
            .map(str::to_string)
            .collect();

        tracing::info!(bucket = %self.bucket, objects = objects.len(), keys = keys.len(), "Listed bucket");
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, BucketError> {
        let read_error = |reason: String| BucketError::Read {
            key: key.to_string(),
            reason,
        };
        match self.store.get(&ObjectPath::from(key)).await {
            Ok(result) => result.bytes().await.map(Some).map_err(|e| read_error(e.to_string())),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => {
                tracing::error!(key, error = %e, "Failed to read object");
                Err(read_error(e.to_string()))
            }
        }
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), BucketError> {
        let size = data.len();
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        match self
            .store
            .put_opts(&ObjectPath::from(key), PutPayload::from(data), options)
            .await
        {
            Ok(result) => {
                tracing::debug!(key, size, etag = ?result.e_tag, "Uploaded object");
                Ok(())
            }
            Err(e) => {
                tracing::error!(key, error = %e, "Failed to upload object");
                Err(BucketError::Upload {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn configure_public_static_site(&self) -> Result<(), BucketError> {
        self.control
            .put_bucket_policy()
            .bucket(&self.bucket)
            .policy(public_read_policy(&self.bucket))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket = %self.bucket, error = %DisplayErrorContext(&e), "Failed to set public-read policy");
                self.configure_error(DisplayErrorContext(&e))
            })?;

        let index_document = IndexDocument::builder()
            .suffix(INDEX_KEY)
            .build()
            .map_err(|e| self.configure_error(e))?;
        let website = WebsiteConfiguration::builder()
            .index_document(index_document)
            .build();

        self.control
            .put_bucket_website()
            .bucket(&self.bucket)
            .website_configuration(website)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket = %self.bucket, error = %DisplayErrorContext(&e), "Failed to configure static website");
                self.configure_error(DisplayErrorContext(&e))
            })?;

        tracing::info!(bucket = %self.bucket, "Bucket configured as public static website");
        Ok(())
    }
}
