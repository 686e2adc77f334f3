//! VP on-disk structures.
//!
//! A VP file is laid out as:
//!
//! ```text
//! [header: 16 bytes][file data, no padding][entry table: 44 bytes * entry_count]
//! ```
//!
//! All integers are unsigned 32-bit little-endian. The table is a flat,
//! pre-order listing of the directory tree: a directory record opens a
//! directory, a record named `..` closes the innermost open one.

mod entry;
mod header;

pub use entry::{decode_entry, encode_entry, validate_name, EntryRecord, TableEntry};
pub use header::{decode_header, encode_header, VpHeader};

/// Magic tag at the start of every VP file.
pub const MAGIC: [u8; 4] = *b"VPVP";

/// The only supported format version.
pub const VERSION: u32 = 2;

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Size of one entry table record in bytes.
pub const ENTRY_SIZE: usize = 44;

/// Width of the null-padded name field.
pub const NAME_FIELD_LEN: usize = 32;

/// Longest name that still leaves room for the terminator.
pub const MAX_NAME_LEN: usize = NAME_FIELD_LEN - 1;

/// Name of the record that closes a directory.
pub const END_OF_DIRECTORY: &str = "..";
