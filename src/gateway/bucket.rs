//! Bucket binding
//!
//! Binds an object store to the caller's bucket and translates store
//! failures into storage errors.

use bytes::Bytes;
use log::{debug, error};
use std::sync::Arc;

use super::{ListRequest, ObjectBody, ObjectItem, ObjectStat, ObjectStore};
use crate::error::StorageError;

#[derive(Clone)]
pub struct BucketGateway {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl BucketGateway {
    /// Opens the bucket, failing with `BucketMissing` if it was never provisioned.
    pub async fn open(store: Arc<dyn ObjectStore>, bucket: String) -> Result<Self, StorageError> {
        debug!("Checking bucket: {}", bucket);
        if !store.bucket_exists(&bucket).await? {
            error!("Bucket {} does not exist", bucket);
            return Err(StorageError::BucketMissing(bucket));
        }
        Ok(Self { store, bucket })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Exact-key stat. A missing key is `Ok(None)`.
    pub async fn stat(&self, key: &str) -> Result<Option<ObjectStat>, StorageError> {
        Ok(self.store.stat(&self.bucket, key).await?)
    }

    pub async fn list(&self, request: &ListRequest) -> Result<Vec<ObjectItem>, StorageError> {
        Ok(self.store.list(&self.bucket, request).await?)
    }

    pub async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        Ok(self.store.put(&self.bucket, key, body, content_type).await?)
    }

    pub async fn get(&self, key: &str) -> Result<ObjectBody, StorageError> {
        Ok(self.store.get(&self.bucket, key).await?)
    }

    pub async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        Ok(self.store.copy(&self.bucket, from, to).await?)
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        Ok(self.store.remove(&self.bucket, key).await?)
    }
}
