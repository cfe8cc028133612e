//! Storage result types
//!
//! Defines result structures returned by storage operations.

use bytes::Bytes;
use serde::Serialize;

use crate::gateway::ObjectBody;

/// Kind of a resolved resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    File,
    Directory,
}

/// Description of a file or directory.
///
/// `size` is present for files and absent for directories; the constructors
/// are the only way to build one. `path + name` is the full key, with a
/// trailing `/` for directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceDescriptor {
    path: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(rename = "type")]
    kind: ResourceKind,
}

impl ResourceDescriptor {
    pub fn file(path: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size: Some(size),
            kind: ResourceKind::File,
        }
    }

    pub fn directory(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size: None,
            kind: ResourceKind::Directory,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    pub fn full_key(&self) -> String {
        format!("{}{}", self.path, self.name)
    }
}

/// A file received for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original file name, may contain `/` for nested uploads
    pub name: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            body: body.into(),
        }
    }
}

/// Result of a download: a raw file or a zip archive of a directory
#[derive(Debug)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: ObjectBody,
}

impl Download {
    /// Value of the `Content-Disposition` header for this download.
    ///
    /// The quoted `filename` escapes `"` and `\` and replaces characters
    /// outside printable ASCII with `_`; `filename*` carries the exact name.
    pub fn content_disposition(&self) -> String {
        let mut quoted = String::with_capacity(self.file_name.len());
        for c in self.file_name.chars() {
            match c {
                '"' | '\\' => {
                    quoted.push('\\');
                    quoted.push(c);
                }
                c if c.is_ascii() && !c.is_ascii_control() => quoted.push(c),
                _ => quoted.push('_'),
            }
        }
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            quoted,
            urlencoding::encode(&self.file_name)
        )
    }
}
