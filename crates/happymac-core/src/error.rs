//! Centralized error types for the HappyMac companion.
//!
//! The relay itself is best-effort and swallows its failures, so these types
//! mostly surface at startup: a broken config file or an unwritable data
//! directory. Use `user_message()` for anything printed to the person running
//! the companion.

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Other(#[source] anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    /// Recovers a typed config or storage error from under any context.
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ConfigError>() {
            Ok(config) => return AppError::Config(config),
            Err(err) => err,
        };
        match err.downcast::<StorageError>() {
            Ok(storage) => AppError::Storage(storage),
            Err(err) => AppError::Other(err),
        }
    }
}

impl AppError {
    /// Returns a short, non-technical message suitable for a terminal.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Storage(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Host key/value persistence errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read store {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write store {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored data is corrupted: {0}")]
    Corrupted(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::Read { .. } => "Unable to read saved settings. Defaults will be used.",
            StorageError::Write { .. } => "Unable to save settings. Check the data directory.",
            StorageError::Corrupted(_) => {
                "Saved settings are corrupted. Consider deleting the state file."
            }
            StorageError::Serialization(_) => "Failed to encode settings. Please try again.",
        }
    }
}
