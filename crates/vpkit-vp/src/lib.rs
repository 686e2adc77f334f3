//! VP archive reader and writer.
//!
//! VP is the flat container format used by FreeSpace 2 and its derivatives.
//! An archive holds one `data` directory tree as:
//!
//! - a 16-byte header (`VPVP`, version 2, table offset, entry count)
//! - the raw bytes of every file, back to back, no compression
//! - a table of 44-byte records listing the tree in pre-order, where a
//!   record named `..` closes the current directory
//!
//! Archives are never edited in place: [`create`] rebuilds one from a
//! directory, [`VpArchive`] reads one back.
//!
//! # Example
//!
//! ```no_run
//! use vpkit_vp::{ReadOptions, VpArchive};
//!
//! let mut archive = VpArchive::open("root_fs2.vp")?;
//!
//! for entry in archive.entries(&ReadOptions::default())? {
//!     let entry = entry?;
//!     println!("{}: {} bytes", entry.path(), entry.size());
//! }
//! # Ok::<(), vpkit_vp::Error>(())
//! ```

mod archive;
mod entry;
mod error;
mod extract;
mod writer;

pub mod format;

pub use archive::{Chunks, Entries, ReadOptions, VpArchive};
pub use entry::{EntryKind, VpEntry};
pub use error::{Error, Result};
pub use extract::{extract, extract_with_progress, pipe, ExtractOptions, ExtractReport};
pub use writer::{create, create_with_progress, CreateOptions, CreateReport};

/// Chunk size for streaming entry data in and out of archives.
pub const CHUNK_SIZE: usize = 1 << 20;

/// Name every archive's top-level directory must have.
pub const ROOT_DIR_NAME: &str = "data";
