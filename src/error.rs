//! Error types shared by the store, builder, and serving layers.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The gram store artifact does not exist; scoring cannot proceed.
    #[error("Gram store not found at {}", .0.display())]
    MissingGramStore(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Gram store artifact
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    // Confusion set artifact
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] confy::ConfyError),

    #[error("Failed to persist artifact: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Invalid corpus source: {0}")]
    InvalidSource(String),
}
