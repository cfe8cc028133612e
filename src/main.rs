//! Cloud storage server - Entry Point
//!
//! Serves per-user virtual filesystems on top of an S3-compatible object store.

use log::{error, info};
use std::process;
use std::sync::Arc;

use cloud_storage::auth::Accounts;
use cloud_storage::config::{ServerConfig, StoreBackend};
use cloud_storage::error::StoreError;
use cloud_storage::gateway::{MemoryStore, ObjectStore, S3Store};
use cloud_storage::{Server, StorageService};

/// Builds the configured object store.
///
/// The in-memory store has no registration flow, so every configured
/// account's bucket is created up front.
async fn build_store(
    config: &ServerConfig,
    accounts: &Accounts,
) -> Result<Arc<dyn ObjectStore>, StoreError> {
    match config.store.backend {
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            for principal in accounts.principals() {
                let bucket = principal.bucket_name();
                info!("Provisioning bucket {} for {}", bucket, principal.username());
                store.create_bucket(&bucket).await;
            }
            Ok(Arc::new(store))
        }
        StoreBackend::S3 => {
            info!("Using object store at {}", config.store.endpoint);
            Ok(Arc::new(S3Store::new(&config.store)?))
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching cloud storage server...");

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let accounts = Accounts::new(&config.accounts);
    let store = match build_store(&config, &accounts).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialise object store: {}", e);
            process::exit(1);
        }
    };

    let server = match Server::new(&config, StorageService::new(store), accounts).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            process::exit(1);
        }
    };
    server.start().await;
}
