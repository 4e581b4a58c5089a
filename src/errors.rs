//! Shared error types for coverage operations
//!
//! Configuration and lifecycle failures cross the public boundary. Cache
//! failures are produced inside persistence and are turned into a boolean
//! outcome plus a log line before they reach a caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for impactcov operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid root / excluded path, or an unusable configuration file
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        path: Option<PathBuf>,
    },

    /// start/stop called out of the required order
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Durable cache could not be written or decoded
    #[error("Cache error: {0}")]
    Cache(String),
}

impl Error {
    /// Create a configuration error without path context
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error about a specific path
    pub fn configuration_with_path(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Configuration {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a lifecycle error
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle(message.into())
    }

    /// Get the associated path, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Configuration { path, .. } => path.as_ref(),
            _ => None,
        }
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;
