//! Client session context
//!
//! Services and limits shared by every session of a server.

use std::sync::Arc;

use crate::auth::Accounts;
use crate::config::StartupConfig;
use crate::storage::StorageService;

pub struct SessionContext {
    pub storage: StorageService,
    pub accounts: Arc<Accounts>,
    /// Longest accepted command line in bytes, including the line ending
    pub max_command_length: usize,
    /// Largest accepted upload request in bytes, all files together
    pub max_upload_size: u64,
}

impl SessionContext {
    pub fn new(storage: StorageService, accounts: Arc<Accounts>, config: &StartupConfig) -> Self {
        Self {
            storage,
            accounts,
            max_command_length: config.max_command_length,
            max_upload_size: config.max_upload_size_bytes(),
        }
    }
}
