//! Name search over the flat key space
//!
//! Every key of the bucket is scanned. Files match on their file name,
//! directories on their last segment. Directories are found both from
//! their markers and from the ancestor prefixes of stored files.

use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::StorageError;
use crate::gateway::{BucketGateway, ListRequest, ObjectItem};
use crate::storage::paths::{directory_descriptor, file_descriptor, is_blank_query, normalize_query};
use crate::storage::results::ResourceDescriptor;

/// Matches found by a scan, keyed by full key
#[derive(Debug, Default)]
struct Matches {
    directories: BTreeSet<String>,
    files: BTreeMap<String, u64>,
}

impl Matches {
    fn collect(items: &[ObjectItem], needle: &str) -> Self {
        let mut matches = Matches::default();

        for item in items {
            let key = item.name.trim_end_matches('/');
            let mut segments: Vec<&str> = key.split('/').collect();

            if !item.is_dir() {
                if let Some(name) = segments.pop() {
                    if name.to_lowercase().contains(needle) {
                        matches.files.insert(key.to_string(), item.size);
                    }
                }
            }

            // Remaining segments are directories: the marker itself and every
            // ancestor of the object.
            for depth in 1..=segments.len() {
                let name = segments[depth - 1];
                if !name.is_empty() && name.to_lowercase().contains(needle) {
                    matches.directories.insert(segments[..depth].join("/"));
                }
            }
        }

        matches
    }

    fn into_descriptors(self) -> Vec<ResourceDescriptor> {
        let directories = self
            .directories
            .iter()
            .map(|key| directory_descriptor(key));
        let files = self
            .files
            .iter()
            .map(|(key, size)| file_descriptor(key, *size));
        directories.chain(files).collect()
    }
}

/// Searches the bucket for resources whose name contains `raw_query`,
/// case-insensitively.
///
/// Directories come first, then files, each in key order. Blank queries and
/// queries without any match both fail with `InvalidOrMissingPath`.
pub async fn search(
    gateway: &BucketGateway,
    raw_query: &str,
) -> Result<Vec<ResourceDescriptor>, StorageError> {
    let query = normalize_query(raw_query);
    if is_blank_query(&query) {
        warn!("Rejected search query '{}'", raw_query);
        return Err(StorageError::InvalidOrMissingPath(
            "invalid or missing search query".to_string(),
        ));
    }

    let items = gateway.list(&ListRequest::recursive("")).await?;
    let results = Matches::collect(&items, &query.to_lowercase()).into_descriptors();

    if results.is_empty() {
        info!("Search '{}' found nothing in {} objects", query, items.len());
        return Err(StorageError::InvalidOrMissingPath(format!(
            "no resources match search query '{}'",
            query
        )));
    }

    info!("Search '{}' found {} resources", query, results.len());
    Ok(results)
}
