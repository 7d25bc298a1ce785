//! In-memory [`BucketStore`] for tests of the reconciliation loop.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::contract::{BucketError, BucketStore, EXPORT_EXTENSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Debug)]
struct State {
    exists: bool,
    public_site: bool,
    objects: BTreeMap<String, StoredObject>,
}

/// A bucket held entirely in memory.
///
/// Failures can be injected for the whole bucket ([`MemoryBucket::unreachable`])
/// or for uploads of individual keys ([`MemoryBucket::fail_uploads_for`]).
#[derive(Debug)]
pub struct MemoryBucket {
    name: String,
    state: RwLock<State>,
    unreachable: bool,
    failing_keys: BTreeSet<String>,
}

impl MemoryBucket {
    fn build(name: &str, exists: bool, objects: BTreeMap<String, StoredObject>) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(State {
                exists,
                public_site: false,
                objects,
            }),
            unreachable: false,
            failing_keys: BTreeSet::new(),
        }
    }

    /// An existing, empty bucket.
    pub fn new(name: &str) -> Self {
        Self::build(name, true, BTreeMap::new())
    }

    /// A bucket that has not been created yet.
    pub fn absent(name: &str) -> Self {
        Self::build(name, false, BTreeMap::new())
    }

    /// A bucket pre-populated with empty objects under `keys`.
    pub fn with_keys<I, S>(name: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let objects = keys
            .into_iter()
            .map(|k| {
                let object = StoredObject {
                    data: Bytes::new(),
                    content_type: "application/octet-stream".to_string(),
                };
                (k.into(), object)
            })
            .collect();
        Self::build(name, true, objects)
    }

    /// Every operation fails with [`BucketError::Access`].
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Uploads to `key` fail with [`BucketError::Upload`].
    pub fn fail_uploads_for(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    pub async fn keys(&self) -> BTreeSet<String> {
        self.state.read().await.objects.keys().cloned().collect()
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.state.read().await.objects.get(key).cloned()
    }

    pub async fn exists(&self) -> bool {
        self.state.read().await.exists
    }

    pub async fn is_public_site(&self) -> bool {
        self.state.read().await.public_site
    }

    fn check_reachable(&self) -> Result<(), BucketError> {
        if self.unreachable {
            return Err(BucketError::Access {
                bucket: self.name.clone(),
                reason: "bucket unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn missing_bucket(&self) -> BucketError {
        BucketError::Access {
            bucket: self.name.clone(),
            reason: "bucket does not exist".to_string(),
        }
    }
}

#[async_trait]
impl BucketStore for MemoryBucket {
    async fn ensure_exists(&self) -> Result<(), BucketError> {
        self.check_reachable()?;
        self.state.write().await.exists = true;
        Ok(())
    }

    async fn list_keys(&self, names_only: bool) -> Result<BTreeSet<String>, BucketError> {
        self.check_reachable()?;
        let state = self.state.read().await;
        if !state.exists {
            return Err(self.missing_bucket());
        }
        let keys = state.objects.keys();
        Ok(if names_only {
            keys.filter_map(|k| k.strip_suffix(EXPORT_EXTENSION))
                .map(str::to_string)
                .collect()
        } else {
            keys.cloned().collect()
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, BucketError> {
        self.check_reachable()?;
        let state = self.state.read().await;
        if !state.exists {
            return Err(self.missing_bucket());
        }
        Ok(state.objects.get(key).map(|o| o.data.clone()))
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), BucketError> {
        self.check_reachable()?;
        if self.failing_keys.contains(key) {
            return Err(BucketError::Upload {
                key: key.to_string(),
                reason: "injected upload failure".to_string(),
            });
        }
        let mut state = self.state.write().await;
        if !state.exists {
            return Err(self.missing_bucket());
        }
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn configure_public_static_site(&self) -> Result<(), BucketError> {
        self.check_reachable()?;
        let mut state = self.state.write().await;
        if !state.exists {
            return Err(self.missing_bucket());
        }
        state.public_site = true;
        Ok(())
    }
}
