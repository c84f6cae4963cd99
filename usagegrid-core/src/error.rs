//! Error types for usagegrid-core

use thiserror::Error;

/// Main error type for the usagegrid-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// File watcher error
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Usage quota endpoint error
    #[error("quota error: {0}")]
    Quota(String),

    /// Credential lookup error
    #[error("credentials error: {0}")]
    Credentials(String),
}

/// Result type alias for usagegrid-core
pub type Result<T> = std::result::Result<T, Error>;
