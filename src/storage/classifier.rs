//! Resource classification
//!
//! Decides whether a normalized key is a file, a directory or nothing,
//! and whether a target key is already taken.

use log::{debug, info};

use crate::error::StorageError;
use crate::gateway::{BucketGateway, ListRequest};
use crate::storage::paths::{directory_descriptor, directory_prefix, file_descriptor};
use crate::storage::results::ResourceDescriptor;

/// What a key resolves to in the bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    File { size: u64 },
    Directory,
}

impl Resource {
    pub fn is_dir(&self) -> bool {
        matches!(self, Resource::Directory)
    }

    /// Descriptor of this resource stored under `key` in `bucket`.
    ///
    /// The empty key is the bucket root, a directory named after the bucket.
    pub fn describe(&self, bucket: &str, key: &str) -> ResourceDescriptor {
        match self {
            Resource::File { size } => file_descriptor(key, *size),
            Resource::Directory if key.is_empty() => {
                ResourceDescriptor::directory("", format!("{}/", bucket))
            }
            Resource::Directory => directory_descriptor(key),
        }
    }
}

/// Classifies `key`.
///
/// An exact object wins over a same-named directory. The empty key is the
/// bucket root and is always a directory. Anything else is
/// `ResourceNotFound`.
pub async fn classify(gateway: &BucketGateway, key: &str) -> Result<Resource, StorageError> {
    if key.is_empty() {
        return Ok(Resource::Directory);
    }

    if let Some(stat) = gateway.stat(key).await? {
        info!("{} classified as file ({} bytes)", key, stat.size);
        return Ok(Resource::File { size: stat.size });
    }

    if has_descendants(gateway, key).await? {
        info!("{} classified as directory", key);
        return Ok(Resource::Directory);
    }

    debug!("{} not found in bucket {}", key, gateway.bucket());
    Err(StorageError::ResourceNotFound(key.to_string()))
}

/// True if `key` is taken by a file or by a directory
pub async fn is_resource_occupied(gateway: &BucketGateway, key: &str) -> Result<bool, StorageError> {
    if gateway.stat(key).await?.is_some() {
        return Ok(true);
    }
    has_descendants(gateway, key).await
}

/// True if a marker or any object exists under `key/`
async fn has_descendants(gateway: &BucketGateway, key: &str) -> Result<bool, StorageError> {
    let request = ListRequest::shallow(directory_prefix(key)).with_limit(1);
    Ok(!gateway.list(&request).await?.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MemoryStore, ObjectStore};
    use bytes::Bytes;
    use std::sync::Arc;

    async fn gateway_with(keys: &[&str]) -> BucketGateway {
        let store = MemoryStore::new();
        store.create_bucket("b").await;
        for key in keys {
            store
                .put("b", key, Bytes::from_static(b"abc"), "text/plain")
                .await
                .unwrap();
        }
        BucketGateway::open(Arc::new(store), "b".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn classifies_files_directories_and_missing_keys() {
        let gateway = gateway_with(&["a.txt", "docs/x.txt", "empty/"]).await;

        assert_eq!(
            classify(&gateway, "a.txt").await.unwrap(),
            Resource::File { size: 3 }
        );
        assert_eq!(classify(&gateway, "docs").await.unwrap(), Resource::Directory);
        assert_eq!(classify(&gateway, "empty").await.unwrap(), Resource::Directory);
        assert_eq!(classify(&gateway, "").await.unwrap(), Resource::Directory);
        assert!(matches!(
            classify(&gateway, "nope").await,
            Err(StorageError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn sibling_with_shared_prefix_is_not_a_directory() {
        let gateway = gateway_with(&["foobar/x.txt"]).await;
        assert!(matches!(
            classify(&gateway, "foo").await,
            Err(StorageError::ResourceNotFound(_))
        ));
        assert!(!is_resource_occupied(&gateway, "foo").await.unwrap());
    }

    #[tokio::test]
    async fn file_wins_over_dangling_marker() {
        let gateway = gateway_with(&["x", "x/"]).await;
        assert_eq!(classify(&gateway, "x").await.unwrap(), Resource::File { size: 3 });
    }

    #[tokio::test]
    async fn occupied_by_file_or_directory() {
        let gateway = gateway_with(&["a.txt", "docs/x.txt"]).await;
        assert!(is_resource_occupied(&gateway, "a.txt").await.unwrap());
        assert!(is_resource_occupied(&gateway, "docs").await.unwrap());
        assert!(!is_resource_occupied(&gateway, "b.txt").await.unwrap());
    }

    #[test]
    fn describe_uses_the_key_layout() {
        let file = Resource::File { size: 5 }.describe("b", "docs/a.txt");
        assert_eq!(file.full_key(), "docs/a.txt");
        let dir = Resource::Directory.describe("b", "docs/sub");
        assert_eq!(dir.name(), "sub/");
    }

    #[tokio::test]
    async fn root_is_described_after_the_bucket() {
        let gateway = gateway_with(&["a.txt"]).await;
        let root = classify(&gateway, "").await.unwrap();
        assert_eq!(
            root.describe(gateway.bucket(), ""),
            ResourceDescriptor::directory("", "b/")
        );
    }
}
