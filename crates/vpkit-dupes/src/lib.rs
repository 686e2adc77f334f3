//! Duplicate detection across a VP load list.
//!
//! The engine mounts every `.vp` in its search directories as one virtual
//! `data` tree. The first archive to provide a file wins, and a file is
//! looked up by its type directory and name, so a same-named file deeper
//! under the same type directory can hide another.
//!
//! This crate scans a load list and reports:
//!
//! - **overrides**: one logical path provided by several archives
//! - **shadows**: same name and type directory, different sub-path
//! - **identical** files, when matching by CRC32
//!
//! # Example
//!
//! ```no_run
//! use vpkit_dupes::{find_duplicates, DupesOptions};
//!
//! for finding in find_duplicates(&["mods/mediavps", "fs2"], &DupesOptions::default())? {
//!     println!("{finding}");
//! }
//! # Ok::<(), vpkit_dupes::Error>(())
//! ```

mod error;
mod findings;
mod index;
mod path_type;
mod resolve;

pub use error::{Error, Result};
pub use findings::{Finding, Holder, Identical, Override, Shadow};
pub use index::{discover, Container, DupKey, LoadIndex, Occurrence};
pub use path_type::path_type;
pub use resolve::{find_duplicates, resolve_checksums, resolve_load_order, DupesOptions, MatchMode};
