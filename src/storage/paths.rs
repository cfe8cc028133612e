//! Path normalization and resolution
//!
//! Turns user-supplied paths into object keys and splits keys into the
//! (parent path, name) pairs every response is built from. All descriptors
//! in the crate go through [`file_descriptor`] and [`directory_descriptor`]
//! so that info, move, search and listing responses share one shape.

use crate::storage::results::ResourceDescriptor;

/// Characters a search query may not consist of exclusively
const QUERY_NOISE: &[char] = &['.', '/', ',', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Normalizes a raw path into an object key.
///
/// Surrounding whitespace and slashes are removed and empty segments are
/// collapsed. The empty string denotes the bucket root. Segments are not
/// validated, so `..` passes through unchanged.
pub fn normalize_path(raw: &str) -> String {
    raw.trim_matches(|c: char| c == '/' || c.is_whitespace())
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalizes a free-text search query. Only surrounding whitespace is removed.
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_string()
}

/// True if the query is empty or made only of path punctuation
pub fn is_blank_query(query: &str) -> bool {
    query.chars().all(|c| QUERY_NOISE.contains(&c) || c.is_whitespace())
}

/// Key used as a listing prefix for the directory `key`
pub fn directory_prefix(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("{}/", key)
    }
}

/// Splits a key at its last `/` into (parent path, leaf name).
///
/// The parent path keeps its trailing `/` and is empty for top-level keys.
/// A trailing `/` on the key itself is ignored.
pub fn split_key(key: &str) -> (&str, &str) {
    let key = key.strip_suffix('/').unwrap_or(key);
    match key.rfind('/') {
        Some(idx) => (&key[..=idx], &key[idx + 1..]),
        None => ("", key),
    }
}

/// Parent directory key of `key`, without trailing slash
pub fn parent_key(key: &str) -> &str {
    let (parent, _) = split_key(key);
    parent.strip_suffix('/').unwrap_or(parent)
}

/// Descriptor of the file stored under `key`
pub fn file_descriptor(key: &str, size: u64) -> ResourceDescriptor {
    let (parent, name) = split_key(key);
    ResourceDescriptor::file(parent, name, size)
}

/// Descriptor of the directory `key`; the name carries a trailing `/`
pub fn directory_descriptor(key: &str) -> ResourceDescriptor {
    let (parent, name) = split_key(key);
    ResourceDescriptor::directory(parent, format!("{}/", name))
}

/// Key of `key` relative to the directory `root`
pub fn relative_to<'a>(root: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(&directory_prefix(root))
}
