//! Logical VP archive entry.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// What a table record stands for once directory markers are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// A file or directory within a VP archive.
///
/// This contains metadata about the entry, not the file data itself.
/// Use [`VpArchive::stream`](crate::VpArchive::stream) to read the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpEntry {
    /// Record name, a single path component.
    name: String,
    /// Full logical path, components joined with `/`.
    path: String,
    kind: EntryKind,
    /// Offset of the file data in the archive.
    offset: u32,
    /// Size of the file data in bytes.
    size: u32,
    /// Modification time, Unix seconds.
    timestamp: u32,
}

impl VpEntry {
    pub(crate) fn new(
        name: String,
        path: String,
        kind: EntryKind,
        offset: u32,
        size: u32,
        timestamp: u32,
    ) -> Self {
        Self {
            name,
            path,
            kind,
            offset,
            size,
            timestamp,
        }
    }

    /// Get the record name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the full logical path.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Get the data offset in the archive.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Get the data size in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Get the raw Unix timestamp.
    #[inline]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Get the last modification time.
    ///
    /// Returns None for directories, whose timestamp carries no meaning.
    pub fn last_modified(&self) -> Option<SystemTime> {
        if self.is_dir() {
            return None;
        }
        UNIX_EPOCH.checked_add(Duration::from_secs(u64::from(self.timestamp)))
    }

    /// Get the directory part of the logical path, if any.
    pub fn parent(&self) -> Option<&str> {
        self.path.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Get the relative output path for extraction.
    pub fn output_path(&self) -> PathBuf {
        self.path.split('/').collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> VpEntry {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        VpEntry::new(name, path.to_string(), EntryKind::File, 16, 10, 1_000)
    }

    #[test]
    fn test_output_path() {
        let entry = file("data/tables/ships.tbl");
        assert_eq!(
            entry.output_path(),
            PathBuf::from("data").join("tables").join("ships.tbl")
        );
    }

    #[test]
    fn test_parent() {
        assert_eq!(file("data/tables/ships.tbl").parent(), Some("data/tables"));
        assert_eq!(file("loose.txt").parent(), None);
    }

    #[test]
    fn test_last_modified() {
        let entry = file("data/a.txt");
        assert_eq!(
            entry.last_modified(),
            Some(UNIX_EPOCH + Duration::from_secs(1_000))
        );

        let dir = VpEntry::new(
            "data".to_string(),
            "data".to_string(),
            EntryKind::Directory,
            0,
            0,
            0,
        );
        assert!(dir.is_dir());
        assert_eq!(dir.last_modified(), None);
    }
}
