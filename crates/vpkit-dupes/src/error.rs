//! Error types for duplicate detection.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while scanning a load list.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reading one of the archives.
    #[error("{0}")]
    Vp(#[from] vpkit_vp::Error),

    /// A search directory is missing or not a directory.
    #[error("search directory not found: {0}")]
    SearchDirNotFound(PathBuf),
}

/// Result type for duplicate detection.
pub type Result<T> = std::result::Result<T, Error>;
