//! Configuration management for the cloud storage server
//!
//! Loads `config.toml` (optional) with `CLOUD_STORAGE__*` environment
//! overrides. Every value has a default so the server starts without a file.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const CONFIG_PATHS: [&str; 2] = [
    "cloud-storage/config", // Docker production: /app/cloud-storage/config.toml
    "config",               // Local development: ./config.toml
];

/// Complete server configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: StartupConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Accounts known to the identity collaborator
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// Listener and session limits (restart required)
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StartupConfig {
    /// IP address to bind the command listener
    pub bind_address: String,

    /// Port for the command listener
    pub port: u16,

    /// Maximum concurrent sessions
    pub max_clients: usize,

    /// Maximum command line length in bytes
    pub max_command_length: usize,

    /// Maximum size of a single uploaded file in MB
    pub max_upload_size_mb: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 2121,
            max_clients: 10,
            max_command_length: 4096,
            max_upload_size_mb: 100,
        }
    }
}

/// Which object store backs the gateway
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    S3,
}

/// Object store connection settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Base URL of the S3-compatible endpoint, e.g. `http://localhost:9000`
    pub endpoint: String,

    pub region: String,
    pub access_key: String,
    pub secret_key: String,

    /// Timeout applied by the HTTP client to every store request
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            endpoint: "http://localhost:9000".to_string(),
            region: "us-east-1".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            request_timeout_secs: 60,
        }
    }
}

/// An account of the identity collaborator
#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
    pub id: u64,
}

impl ServerConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();
        for path in CONFIG_PATHS {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(Environment::with_prefix("CLOUD_STORAGE").separator("__"))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server.port == 0 {
            return Err(config::ConfigError::Message("port cannot be 0".into()));
        }

        if self.server.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.server.max_upload_size_mb == 0 {
            return Err(config::ConfigError::Message(
                "max_upload_size_mb must be greater than 0".into(),
            ));
        }

        if self.store.backend == StoreBackend::S3 {
            if self.store.endpoint.trim().is_empty() {
                return Err(config::ConfigError::Message(
                    "store.endpoint is required for the s3 backend".into(),
                ));
            }
            if self.store.access_key.is_empty() || self.store.secret_key.is_empty() {
                return Err(config::ConfigError::Message(
                    "store.access_key and store.secret_key are required for the s3 backend".into(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            if !seen.insert(account.username.as_str()) {
                return Err(config::ConfigError::Message(format!(
                    "duplicate account '{}'",
                    account.username
                )));
            }
        }

        Ok(())
    }
}

impl StartupConfig {
    /// Get bind address and port as socket address
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get maximum upload size in bytes
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
