//! Error types for soundcheck

use thiserror::Error;

/// Result type alias using the soundcheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// Soundcheck error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid build info label: {0:?}")]
    InvalidBuildInfo(String),

    #[error("Refusing to delete {0:?}: not a synthetic e2e test user")]
    UnsafeDeletion(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),
}
