//! Shared plumbing for the HappyMac companion: configuration, errors,
//! host key/value persistence and logging setup.

pub mod config;
pub mod error;
pub mod storage;

pub use config::{
    Config, ConfigurationConfig, LocationConfig, LocationMode, ValidationResult, WeatherConfig,
};
pub use error::{AppError, ConfigError, StorageError};
pub use storage::{FileStore, KeyValueStore, KeyValueStoreExt, MemoryStore};

use anyhow::Result;

/// Initialize logging.
///
/// Logs go to stderr: stdout is reserved for the device channel.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("HappyMac core initialized");
    Ok(())
}
