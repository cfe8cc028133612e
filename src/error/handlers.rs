//! Error handlers
//!
//! Translates errors into externally visible status codes. This is the only
//! place where an error kind becomes a status.

use log::{error, warn};

use crate::error::types::{ProtocolError, ServerError, StorageError};

/// Log a server error at a level matching its severity
pub fn handle_error(err: &ServerError) {
    match err {
        ServerError::Storage(StorageError::StoreUnavailable(_))
        | ServerError::Storage(StorageError::BucketMissing(_))
        | ServerError::Io(_) => error!("Server error: {}", err),
        _ => warn!("Request failed: {}", err),
    }
}

/// Status code for a storage error. Each kind maps to exactly one code.
pub fn storage_error_status(err: &StorageError) -> u16 {
    match err {
        StorageError::Unauthenticated => 401,
        StorageError::BucketMissing(_) => 500,
        StorageError::InvalidOrMissingPath(_) => 400,
        StorageError::ResourceNotFound(_) => 404,
        StorageError::ResourceAlreadyExists(_) => 409,
        StorageError::StoreUnavailable(_) => 503,
    }
}

/// Convert error to response status code
pub fn error_to_status(err: &ServerError) -> u16 {
    match err {
        ServerError::Auth(_) => 401,
        ServerError::Storage(e) => storage_error_status(e),
        ServerError::Protocol(ProtocolError::UnknownCommand(_)) => 501,
        ServerError::Protocol(ProtocolError::Malformed(_)) => 422,
        ServerError::Protocol(ProtocolError::PayloadTooLarge { .. }) => 413,
        ServerError::Io(_) => 500,
    }
}
