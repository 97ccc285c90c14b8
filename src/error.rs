//! Error types for tasksync
//!
//! Every fallible path in the engine resolves to one of these variants.
//! Shape-detection and update-construction failures are recovered inside
//! the mutation engine (snapshot restore + refetch); the variants here are
//! what callers of the lower-level APIs observe.

use thiserror::Error;

/// Main error type for tasksync operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid recurrence rule: {0}")]
    InvalidRecurrence(String),

    #[error("Parent task not found in cache: {0}")]
    ParentNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for tasksync operations
pub type Result<T> = std::result::Result<T, Error>;
