//! Storage operations
//!
//! Public entry points of the virtual filesystem. Every operation resolves
//! the caller's bucket, normalizes its path arguments and then drives the
//! classifier, enumerator, mover, search and archive components.

use bytes::Bytes;
use log::{info, warn};
use std::sync::Arc;

use crate::auth::Caller;
use crate::error::StorageError;
use crate::gateway::{BucketGateway, ObjectStore};
use crate::storage::archive::archive_directory;
use crate::storage::classifier::{Resource, classify, is_resource_occupied};
use crate::storage::enumerator::{directory_contents, list_children};
use crate::storage::mover;
use crate::storage::paths::{
    directory_descriptor, directory_prefix, file_descriptor, normalize_path, parent_key, split_key,
};
use crate::storage::results::{Download, ResourceDescriptor, UploadFile};
use crate::storage::search;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Virtual filesystem over per-user buckets
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn ObjectStore>,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Binds the service to the caller's bucket
    async fn open(&self, caller: &Caller) -> Result<BucketGateway, StorageError> {
        let principal = caller.principal()?;
        BucketGateway::open(self.store.clone(), principal.bucket_name()).await
    }

    /// Describes the file or directory at `path`
    pub async fn resource_info(
        &self,
        caller: &Caller,
        path: &str,
    ) -> Result<ResourceDescriptor, StorageError> {
        info!("resource_info: path '{}'", path);
        let gateway = self.open(caller).await?;
        let key = required_key(path)?;
        let resource = classify(&gateway, &key).await?;
        Ok(resource.describe(gateway.bucket(), &key))
    }

    /// Deletes a file, or a directory with everything below it
    pub async fn remove(&self, caller: &Caller, path: &str) -> Result<(), StorageError> {
        info!("remove: path '{}'", path);
        let gateway = self.open(caller).await?;
        let key = required_key(path)?;

        match classify(&gateway, &key).await? {
            Resource::File { .. } => gateway.remove(&key).await?,
            Resource::Directory => {
                let items = list_children(&gateway, &key, true).await?;
                if items.is_empty() {
                    return Err(StorageError::ResourceNotFound(key));
                }
                for item in &items {
                    gateway.remove(&item.name).await?;
                }
                info!("Removed directory '{}' ({} objects)", key, items.len());
            }
        }
        Ok(())
    }

    /// Moves or renames the resource at `from` to `to`
    pub async fn move_resource(
        &self,
        caller: &Caller,
        from: &str,
        to: &str,
    ) -> Result<ResourceDescriptor, StorageError> {
        info!("move_resource: '{}' -> '{}'", from, to);
        let gateway = self.open(caller).await?;
        let from = required_key(from)?;
        let to = required_key(to)?;
        mover::move_resource(&gateway, &from, &to).await
    }

    /// Finds files and directories whose name contains `query`
    pub async fn search(
        &self,
        caller: &Caller,
        query: &str,
    ) -> Result<Vec<ResourceDescriptor>, StorageError> {
        info!("search: query '{}'", query);
        let gateway = self.open(caller).await?;
        search::search(&gateway, query).await
    }

    /// Stores `files` below the directory `path`.
    ///
    /// Files are handled in order. The first one that conflicts or fails
    /// aborts the upload; files stored before it remain.
    pub async fn upload(
        &self,
        caller: &Caller,
        path: &str,
        files: Vec<UploadFile>,
    ) -> Result<Vec<ResourceDescriptor>, StorageError> {
        info!("upload: path '{}', {} files", path, files.len());
        let gateway = self.open(caller).await?;
        if files.is_empty() {
            return Err(StorageError::InvalidOrMissingPath(
                "no files to upload".to_string(),
            ));
        }

        let directory = directory_prefix(&normalize_path(path));
        let mut uploaded = Vec::with_capacity(files.len());

        for file in files {
            let name = normalize_path(&file.name);
            if name.is_empty() {
                return Err(StorageError::InvalidOrMissingPath(format!(
                    "empty file name in upload to '{}'",
                    path
                )));
            }
            let key = format!("{}{}", directory, name);

            if is_resource_occupied(&gateway, &key).await? {
                warn!("Upload target {} already exists", key);
                return Err(StorageError::ResourceAlreadyExists(key));
            }

            let size = file.body.len() as u64;
            let content_type = file.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
            gateway.put(&key, file.body, content_type).await?;
            info!("Uploaded {} ({} bytes)", key, size);
            uploaded.push(file_descriptor(&key, size));
        }

        Ok(uploaded)
    }

    /// Lists the immediate children of the directory `path`
    pub async fn list_directory(
        &self,
        caller: &Caller,
        path: &str,
    ) -> Result<Vec<ResourceDescriptor>, StorageError> {
        info!("list_directory: path '{}'", path);
        let gateway = self.open(caller).await?;
        directory_contents(&gateway, &normalize_path(path)).await
    }

    /// Creates an empty directory. Its parent must already exist.
    pub async fn create_directory(
        &self,
        caller: &Caller,
        path: &str,
    ) -> Result<ResourceDescriptor, StorageError> {
        info!("create_directory: path '{}'", path);
        let gateway = self.open(caller).await?;
        let key = required_key(path)?;

        if is_resource_occupied(&gateway, &key).await? {
            warn!("Directory {} already exists", key);
            return Err(StorageError::ResourceAlreadyExists(key));
        }

        let parent = parent_key(&key);
        if !classify(&gateway, parent).await?.is_dir() {
            return Err(StorageError::ResourceNotFound(parent.to_string()));
        }

        gateway
            .put(&directory_prefix(&key), Bytes::new(), DEFAULT_CONTENT_TYPE)
            .await?;
        info!("Created directory {}", key);
        Ok(directory_descriptor(&key))
    }

    /// Downloads a file as-is, or a directory as a zip archive
    pub async fn download(&self, caller: &Caller, path: &str) -> Result<Download, StorageError> {
        info!("download: path '{}'", path);
        let gateway = self.open(caller).await?;
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(StorageError::ResourceNotFound(
                "the bucket itself cannot be downloaded".to_string(),
            ));
        }

        let (_, name) = split_key(&key);
        match classify(&gateway, &key).await? {
            Resource::File { .. } => Ok(Download {
                file_name: name.to_string(),
                content_type: DEFAULT_CONTENT_TYPE,
                body: gateway.get(&key).await?,
            }),
            Resource::Directory => Ok(Download {
                file_name: format!("{}.zip", name),
                content_type: ZIP_CONTENT_TYPE,
                body: archive_directory(&gateway, &key).await?,
            }),
        }
    }
}

/// Normalizes a path that must not denote the bucket root
fn required_key(path: &str) -> Result<String, StorageError> {
    let key = normalize_path(path);
    if key.is_empty() {
        warn!("Path '{}' is empty or the bucket root", path);
        return Err(StorageError::InvalidOrMissingPath(path.to_string()));
    }
    Ok(key)
}
