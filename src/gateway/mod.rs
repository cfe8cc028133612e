//! Bucket gateway
//!
//! The only I/O boundary of the storage core. [`ObjectStore`] is implemented
//! by an in-process store and by an S3/MinIO client; [`BucketGateway`] binds
//! a store to one caller's bucket.

pub mod bucket;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::io;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::error::StoreError;

pub use bucket::BucketGateway;
pub use memory::MemoryStore;
pub use s3::S3Store;

/// An object returned by a listing.
///
/// Non-recursive listings also return delimiter prefixes (`a/b/`) as items
/// with size 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectItem {
    pub name: String,
    pub size: u64,
}

impl ObjectItem {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// True for explicit directory markers and delimiter prefixes
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// Metadata returned by an exact-key stat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
}

/// Chunks of an object body in the order they arrive
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Body of a fetched object. `size` is known before the first chunk is read.
pub struct ObjectBody {
    pub size: u64,
    pub stream: ByteStream,
}

impl ObjectBody {
    pub fn new(size: u64, stream: ByteStream) -> Self {
        Self { size, stream }
    }

    /// Body already held in memory, yielded as a single chunk
    pub fn from_bytes(bytes: Bytes) -> Self {
        let size = bytes.len() as u64;
        let stream = stream::once(future::ready(Ok::<_, io::Error>(bytes))).boxed();
        Self { size, stream }
    }

    pub fn into_reader(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(self.stream)
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Parameters of a listing request
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub prefix: String,
    pub recursive: bool,
    pub limit: Option<usize>,
}

impl ListRequest {
    /// Immediate children of `prefix` (delimiter `/`)
    pub fn shallow(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            recursive: false,
            limit: None,
        }
    }

    /// Every object below `prefix`
    pub fn recursive(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            recursive: true,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Primitive operations of an S3-compatible object store.
///
/// `stat` reports a missing key as `Ok(None)`; every other call reports it as
/// `StoreError::NotFound`. Transport and credential failures are
/// `StoreError::Unavailable`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    async fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>, StoreError>;

    async fn list(&self, bucket: &str, request: &ListRequest) -> Result<Vec<ObjectItem>, StoreError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Opens the object for reading. The body is streamed, not buffered.
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError>;

    /// Server-side copy inside one bucket
    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError>;

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}
