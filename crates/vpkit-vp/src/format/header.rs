//! VP file header.

use vpkit_common::BinaryReader;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{HEADER_SIZE, MAGIC, VERSION};
use crate::{Error, Result};

/// VP file header, found at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct VpHeader {
    /// Magic tag, always `VPVP`
    pub magic: [u8; 4],
    /// Format version
    pub version: U32,
    /// Absolute offset of the entry table
    pub index_offset: U32,
    /// Number of table records, directory markers included
    pub entry_count: U32,
}

impl VpHeader {
    /// Create a version 2 header.
    pub fn new(index_offset: u32, entry_count: u32) -> Self {
        Self {
            magic: MAGIC,
            version: U32::new(VERSION),
            index_offset: U32::new(index_offset),
            entry_count: U32::new(entry_count),
        }
    }

    /// Offset of the entry table.
    #[inline]
    pub fn index_offset(&self) -> u32 {
        self.index_offset.get()
    }

    /// Number of records in the entry table.
    #[inline]
    pub fn entry_count(&self) -> u32 {
        self.entry_count.get()
    }
}

/// Encode a header into its fixed 16-byte layout.
pub fn encode_header(header: &VpHeader) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out.copy_from_slice(header.as_bytes());
    out
}

/// Decode and validate a header.
///
/// Fails with [`Error::BadMagic`] or [`Error::BadVersion`] when the tag or
/// version do not match.
pub fn decode_header(bytes: &[u8]) -> Result<VpHeader> {
    let mut reader = BinaryReader::new(bytes);
    let header: VpHeader = reader.read_struct()?;

    if header.magic != MAGIC {
        return Err(Error::BadMagic {
            expected: MAGIC,
            actual: header.magic,
        });
    }
    if header.version.get() != VERSION {
        return Err(Error::BadVersion(header.version.get()));
    }

    Ok(header)
}
