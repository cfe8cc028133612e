//! Error types
//!
//! Defines the closed error taxonomy of the storage core and the errors of
//! the surrounding session layer.

use std::io;

use thiserror::Error;

/// Storage core errors.
///
/// Every failure a storage operation can surface is one of these kinds.
/// Inner components never catch or retry them.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("User is not authenticated")]
    Unauthenticated,

    #[error("Bucket '{0}' does not exist")]
    BucketMissing(String),

    #[error("Invalid or missing path: {0}")]
    InvalidOrMissingPath(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Errors reported by an object store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for StorageError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(key) => StorageError::ResourceNotFound(key),
            StoreError::BucketNotFound(bucket) => StorageError::BucketMissing(bucket),
            StoreError::Unavailable(msg) => StorageError::StoreUnavailable(msg),
        }
    }
}

/// Authentication errors raised by the session layer
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid password for user: {0}")]
    InvalidPassword(String),

    #[error("Please enter the username first")]
    UsernameRequired,
}

/// Command protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Malformed command: {0}")]
    Malformed(String),

    #[error("Payload too large: {size} bytes exceeds {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },
}

/// General server error that encompasses all error types
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<StoreError> for ServerError {
    fn from(error: StoreError) -> Self {
        ServerError::Storage(error.into())
    }
}
