//! Directory enumeration

use log::info;

use crate::error::StorageError;
use crate::gateway::{BucketGateway, ListRequest, ObjectItem};
use crate::storage::classifier::{Resource, classify};
use crate::storage::paths::{directory_descriptor, directory_prefix, file_descriptor};
use crate::storage::results::ResourceDescriptor;

/// Lists the objects under the directory `key`.
///
/// Shallow listings return immediate children (subdirectories as `x/`
/// prefixes), recursive listings every descendant object. Both may include
/// the directory's own marker.
pub async fn list_children(
    gateway: &BucketGateway,
    key: &str,
    recursive: bool,
) -> Result<Vec<ObjectItem>, StorageError> {
    let prefix = directory_prefix(key);
    let request = if recursive {
        ListRequest::recursive(prefix)
    } else {
        ListRequest::shallow(prefix)
    };
    gateway.list(&request).await
}

/// Describes the immediate children of the directory `key`.
///
/// Fails with `InvalidOrMissingPath` when `key` is a file.
pub async fn directory_contents(
    gateway: &BucketGateway,
    key: &str,
) -> Result<Vec<ResourceDescriptor>, StorageError> {
    if let Resource::File { .. } = classify(gateway, key).await? {
        return Err(StorageError::InvalidOrMissingPath(format!(
            "{} is a file, not a directory",
            key
        )));
    }

    let prefix = directory_prefix(key);
    let items = list_children(gateway, key, false).await?;

    let contents: Vec<ResourceDescriptor> = items
        .iter()
        .filter(|item| item.name.len() > prefix.len())
        .map(|item| {
            if item.is_dir() {
                directory_descriptor(&item.name)
            } else {
                file_descriptor(&item.name, item.size)
            }
        })
        .collect();

    info!("Listed directory '{}' - {} entries", key, contents.len());
    Ok(contents)
}
