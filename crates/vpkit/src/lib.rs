//! vpkit - FreeSpace VP archive toolkit.
//!
//! One entry point for the vpkit crates.
//!
//! # Crates
//!
//! - [`vpkit_common`] - Binary reading and CRC32
//! - [`vpkit_vp`] - VP archive reading, extraction and creation
//! - [`vpkit_dupes`] - Override and shadow detection across load lists
//!
//! # Example
//!
//! ```no_run
//! use vpkit::prelude::*;
//!
//! let mut archive = VpArchive::open("root_fs2.vp")?;
//! let tables = ReadOptions::with_filter("*.tbl")?.lowercase(true);
//!
//! for entry in archive.collect_entries(&tables)? {
//!     let crc = archive.crc32(&entry)?;
//!     println!("{:08x} {}", crc, entry.path());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use vpkit_common as common;
pub use vpkit_dupes as dupes;
pub use vpkit_vp as vp;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use vpkit_common::{crc, BinaryReader};
    pub use vpkit_dupes::{find_duplicates, DupesOptions, Finding, MatchMode};
    pub use vpkit_vp::{
        create, extract, pipe, CreateOptions, ExtractOptions, ReadOptions, VpArchive, VpEntry,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
