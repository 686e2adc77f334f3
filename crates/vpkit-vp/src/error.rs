//! Error types for the VP crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when working with VP archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] vpkit_common::Error),

    /// Invalid path filter.
    #[error("invalid filter pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    /// Path does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(PathBuf),

    /// Path exists but is not a regular file.
    #[error("not a file: {0}")]
    NotAFile(PathBuf),

    /// Path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Header magic does not read `VPVP`.
    #[error("invalid VP magic: expected {expected:?}, got {actual:?}")]
    BadMagic { expected: [u8; 4], actual: [u8; 4] },

    /// Header version is not the supported one.
    #[error("unsupported VP version: {0}")]
    BadVersion(u32),

    /// Table or directory nesting is inconsistent.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// Entry name does not fit the fixed-width name field.
    #[error("name too long ({len} bytes, max {max}): {name}")]
    NameTooLong { name: String, len: usize, max: usize },

    /// Entry name contains bytes outside printable ASCII.
    #[error("name must be ASCII without NUL bytes: {0}")]
    NonAsciiName(String),

    /// Two paths in a source tree differ only by letter case.
    #[error("case-insensitive name collision: {first} and {second}")]
    DuplicateName { first: String, second: String },

    /// More entries than the 32-bit entry count can hold.
    #[error("too many entries: {0}")]
    TooManyEntries(u64),

    /// Header, data and table together exceed the 32-bit offset range.
    #[error("archive too large: {0} bytes")]
    ArchiveTooLarge(u64),

    /// Archive sources must be rooted at a directory called `data`.
    #[error("source directory must be named \"data\": {0}")]
    SourceMustBeNamedData(PathBuf),

    /// Refusing to replace an existing archive.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// A source file changed size between scanning and copying.
    #[error("source file changed while archiving: {0}")]
    SourceChanged(PathBuf),

    /// A file sits where a directory is expected, or the other way round.
    #[error("on-disk conflict: {path} already exists as a {existing}")]
    OnDiskConflict {
        path: PathBuf,
        existing: &'static str,
    },
}

/// Result type for VP operations.
pub type Result<T> = std::result::Result<T, Error>;
