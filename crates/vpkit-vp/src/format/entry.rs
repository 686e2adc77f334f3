//! VP entry table records.

use vpkit_common::BinaryReader;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{END_OF_DIRECTORY, ENTRY_SIZE, MAX_NAME_LEN, NAME_FIELD_LEN};
use crate::{Error, Result};

/// One entry table record as stored on disk.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct EntryRecord {
    /// Offset of the file data (0 for directories)
    pub offset: U32,
    /// Size of the file data (0 for directories and markers)
    pub size: U32,
    /// Null-padded name
    pub name: [u8; NAME_FIELD_LEN],
    /// Modification time, Unix seconds
    pub timestamp: U32,
}

/// A decoded entry table record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub offset: u32,
    pub size: u32,
    pub name: String,
    pub timestamp: u32,
}

impl TableEntry {
    /// Whether this record closes the current directory.
    #[inline]
    pub fn is_end_marker(&self) -> bool {
        self.name == END_OF_DIRECTORY
    }

    /// Whether this record opens a directory.
    ///
    /// Directories carry no size and no timestamp. A zero-size record with a
    /// timestamp is an empty file written by some other tool.
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.size == 0 && self.timestamp == 0 && !self.is_end_marker()
    }
}

/// Check that a name fits the name field and is plain ASCII.
pub fn validate_name(name: &str) -> Result<()> {
    if !name.is_ascii() || name.bytes().any(|b| b == 0) {
        return Err(Error::NonAsciiName(name.to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong {
            name: name.to_string(),
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Encode a record into its fixed 44-byte layout.
///
/// The name is right-padded with null bytes.
pub fn encode_entry(offset: u32, size: u32, name: &str, timestamp: u32) -> Result<[u8; ENTRY_SIZE]> {
    validate_name(name)?;

    let mut name_field = [0u8; NAME_FIELD_LEN];
    name_field[..name.len()].copy_from_slice(name.as_bytes());

    let record = EntryRecord {
        offset: U32::new(offset),
        size: U32::new(size),
        name: name_field,
        timestamp: U32::new(timestamp),
    };

    let mut out = [0u8; ENTRY_SIZE];
    out.copy_from_slice(record.as_bytes());
    Ok(out)
}

/// Decode one record. The name runs up to the first null byte.
pub fn decode_entry(bytes: &[u8]) -> Result<TableEntry> {
    let mut reader = BinaryReader::new(bytes);

    let offset = reader.read_u32()?;
    let size = reader.read_u32()?;
    let name = reader.read_string_in_buffer(NAME_FIELD_LEN)?.into_owned();
    let timestamp = reader.read_u32()?;

    Ok(TableEntry {
        offset,
        size,
        name,
        timestamp,
    })
}
