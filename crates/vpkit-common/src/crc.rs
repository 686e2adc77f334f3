//! CRC32 hashing utilities.
//!
//! The checksum is the standard IEEE CRC-32 (the zlib/PNG polynomial), so
//! values can be compared against other tools.

/// Compute the CRC32 of a byte slice.
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Incremental CRC32 over data that arrives in chunks.
#[derive(Debug, Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk.
    #[inline]
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Finish and return the checksum.
    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}
