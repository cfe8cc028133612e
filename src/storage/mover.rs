//! Move and rename engine
//!
//! A move is a copy followed by a delete, per object. Directory moves walk
//! the whole subtree. Nothing is rolled back: if a step fails the error of
//! that step is returned and every completed step stays in place.

use log::{error, info, warn};

use crate::error::StorageError;
use crate::gateway::BucketGateway;
use crate::storage::classifier::{Resource, classify, is_resource_occupied};
use crate::storage::enumerator::list_children;
use crate::storage::paths::{directory_descriptor, file_descriptor, relative_to};
use crate::storage::results::ResourceDescriptor;

/// Moves the resource at `from` to `to`. Both keys must be normalized and
/// non-empty.
pub async fn move_resource(
    gateway: &BucketGateway,
    from: &str,
    to: &str,
) -> Result<ResourceDescriptor, StorageError> {
    let resource = classify(gateway, from).await?;

    if resource.is_dir() && relative_to(from, to).is_some() {
        warn!("Refusing to move {} into its own subtree {}", from, to);
        return Err(StorageError::InvalidOrMissingPath(format!(
            "cannot move {} into itself",
            from
        )));
    }

    if is_resource_occupied(gateway, to).await? {
        warn!("Move target {} already exists", to);
        return Err(StorageError::ResourceAlreadyExists(to.to_string()));
    }

    match resource {
        Resource::File { size } => {
            move_object(gateway, from, to).await?;
            Ok(file_descriptor(to, size))
        }
        Resource::Directory => {
            move_directory(gateway, from, to).await?;
            Ok(directory_descriptor(to))
        }
    }
}

async fn move_directory(gateway: &BucketGateway, from: &str, to: &str) -> Result<(), StorageError> {
    let items = list_children(gateway, from, true).await?;
    info!("Moving directory {} -> {} ({} objects)", from, to, items.len());

    for item in items {
        let Some(relative) = relative_to(from, &item.name) else {
            continue;
        };
        let target = format!("{}/{}", to, relative);
        move_object(gateway, &item.name, &target).await?;
    }

    Ok(())
}

/// Copies one object and removes the source. A failed copy leaves the
/// source untouched; a failed remove leaves both copies.
async fn move_object(gateway: &BucketGateway, from: &str, to: &str) -> Result<(), StorageError> {
    gateway.copy(from, to).await.map_err(|e| {
        error!("Copy {} -> {} failed: {}", from, to, e);
        e
    })?;

    gateway.remove(from).await.map_err(|e| {
        error!("Copied {} to {} but removing the source failed: {}", from, to, e);
        e
    })?;

    info!("Moved {} -> {}", from, to);
    Ok(())
}
