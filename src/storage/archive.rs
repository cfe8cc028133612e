//! Zip archives of directory subtrees
//!
//! Objects are fetched one after another and handed chunk by chunk to a
//! blocking writer task that compresses them into a spooled temporary file.
//! The finished archive is streamed back from that file, so memory use stays
//! at a few chunks whatever the size of the subtree.

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use log::{debug, error, info};
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::StorageError;
use crate::gateway::{BucketGateway, ObjectBody, ObjectItem};
use crate::storage::enumerator::list_children;
use crate::storage::paths::relative_to;

/// Chunks in flight between the fetching task and the zip writer
const PART_QUEUE_DEPTH: usize = 16;

/// Input of the zip writer task
enum ArchivePart {
    /// Starts a new entry
    Entry(String),
    /// Appends to the current entry
    Data(Bytes),
}

/// Builds a zip of every object below the directory `key`.
///
/// Entries are named relative to `key`. Directory markers are skipped, and
/// objects are fetched one after another.
pub async fn archive_directory(
    gateway: &BucketGateway,
    key: &str,
) -> Result<ObjectBody, StorageError> {
    let items = list_children(gateway, key, true).await?;
    let (sender, receiver) = mpsc::channel(PART_QUEUE_DEPTH);
    let writer = tokio::task::spawn_blocking(move || write_archive(receiver));

    let fetched = feed_archive(gateway, key, &items, &sender).await;
    drop(sender);

    let written = writer.await.map_err(archive_error)?;
    fetched?;
    let (spool, size) = written?;

    info!("Archived directory '{}' ({} bytes)", key, size);
    let stream = ReaderStream::new(tokio::fs::File::from_std(spool)).boxed();
    Ok(ObjectBody::new(size, stream))
}

/// Sends every non-marker object below `key` to the writer task.
///
/// Returns early without error when the writer has stopped; its own result
/// carries the reason.
async fn feed_archive(
    gateway: &BucketGateway,
    key: &str,
    items: &[ObjectItem],
    sender: &mpsc::Sender<ArchivePart>,
) -> Result<(), StorageError> {
    for item in items.iter().filter(|item| !item.is_dir()) {
        let Some(entry) = relative_to(key, &item.name) else {
            continue;
        };

        let mut body = gateway.get(&item.name).await?.stream;
        if sender.send(ArchivePart::Entry(entry.to_string())).await.is_err() {
            return Ok(());
        }
        while let Some(chunk) = body.try_next().await.map_err(|e| {
            error!("Failed to read {} for archive: {}", item.name, e);
            StorageError::StoreUnavailable(format!("failed to read {}: {}", item.name, e))
        })? {
            if sender.send(ArchivePart::Data(chunk)).await.is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Compresses the received parts into a temporary file, then rewinds it.
fn write_archive(mut receiver: mpsc::Receiver<ArchivePart>) -> Result<(File, u64), StorageError> {
    let spool = tempfile::tempfile().map_err(archive_error)?;
    let mut zip = ZipWriter::new(spool);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = 0usize;

    while let Some(part) = receiver.blocking_recv() {
        match part {
            ArchivePart::Entry(name) => {
                debug!("Adding {} to archive", name);
                zip.start_file(name, options).map_err(archive_error)?;
                entries += 1;
            }
            ArchivePart::Data(chunk) => zip.write_all(&chunk).map_err(archive_error)?,
        }
    }

    let mut spool = zip.finish().map_err(archive_error)?;
    let size = spool.seek(SeekFrom::End(0)).map_err(archive_error)?;
    spool.seek(SeekFrom::Start(0)).map_err(archive_error)?;
    debug!("Archive written with {} entries", entries);
    Ok((spool, size))
}

fn archive_error(e: impl std::fmt::Display) -> StorageError {
    error!("Failed to write archive: {}", e);
    StorageError::StoreUnavailable(format!("failed to write archive: {}", e))
}
