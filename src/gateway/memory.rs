//! In-process object store
//!
//! Keeps objects in an ordered map per bucket and answers listings with the
//! same delimiter semantics as S3, so the storage core behaves identically
//! against it and against MinIO.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{ListRequest, ObjectBody, ObjectItem, ObjectStat, ObjectStore};
use crate::error::StoreError;

type Bucket = BTreeMap<String, Bytes>;

#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty bucket. Existing buckets are left untouched.
    pub async fn create_bucket(&self, bucket: &str) {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
    }

    /// Every key in a bucket, in order
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn list_bucket(objects: &Bucket, request: &ListRequest) -> Vec<ObjectItem> {
    let mut items: Vec<ObjectItem> = Vec::new();
    let prefix = request.prefix.as_str();

    for (key, body) in objects.range(prefix.to_string()..) {
        if !key.starts_with(prefix) {
            break;
        }

        let rest = &key[prefix.len()..];
        let item = match rest.find('/') {
            Some(idx) if !request.recursive => {
                ObjectItem::new(&key[..prefix.len() + idx + 1], 0)
            }
            _ => ObjectItem::new(key.clone(), body.len() as u64),
        };

        // A delimiter prefix may already have been emitted, either by an
        // earlier descendant or by its own marker object.
        if items.last().is_some_and(|last| last.name == item.name) {
            continue;
        }
        items.push(item);

        if request.limit.is_some_and(|limit| items.len() >= limit) {
            break;
        }
    }

    items
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.buckets.read().await.contains_key(bucket))
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>, StoreError> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        Ok(objects.get(key).map(|body| ObjectStat {
            size: body.len() as u64,
        }))
    }

    async fn list(&self, bucket: &str, request: &ListRequest) -> Result<Vec<ObjectItem>, StoreError> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        Ok(list_bucket(objects, request))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .get(key)
            .map(|body| ObjectBody::from_bytes(body.clone()))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        let source = objects
            .get(from)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        objects.insert(to.to_string(), source);
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        // S3 deletes are idempotent
        objects.remove(key);
        Ok(())
    }
}
