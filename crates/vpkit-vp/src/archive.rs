//! VP archive reader.
//!
//! The entry table is a flat pre-order walk of the directory tree. Reading it
//! back means replaying that walk with a directory stack: a zero-size record
//! pushes a directory, a `..` record pops one, and anything else is a file in
//! the directory currently on top.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::debug;
use vpkit_common::crc::Crc32;

use crate::entry::{EntryKind, VpEntry};
use crate::format::{decode_entry, decode_header, VpHeader, ENTRY_SIZE, HEADER_SIZE};
use crate::{Error, Result, CHUNK_SIZE};

/// How entries are presented while iterating.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Fold record names to lowercase before building paths.
    pub lowercase: bool,
    /// Only yield entries whose logical path matches this glob.
    pub filter: Option<Pattern>,
}

impl ReadOptions {
    /// Options with a glob filter on the logical path.
    pub fn with_filter(pattern: &str) -> Result<Self> {
        Ok(Self {
            lowercase: false,
            filter: Some(Pattern::new(pattern)?),
        })
    }

    /// Enable or disable lowercase folding.
    pub fn lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    fn matches(&self, path: &str) -> bool {
        match &self.filter {
            Some(pattern) => pattern.matches_with(
                path,
                MatchOptions {
                    case_sensitive: !self.lowercase,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                },
            ),
            None => true,
        }
    }
}

/// An open VP archive.
pub struct VpArchive {
    reader: BufReader<File>,
    path: PathBuf,
    /// Archive file name, used to label results.
    name: String,
    header: VpHeader,
    file_len: u64,
}

impl VpArchive {
    /// Open an archive and validate its header and table bounds.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }

        let file_len = metadata.len();
        if file_len < HEADER_SIZE as u64 {
            return Err(Error::MalformedArchive(format!(
                "file is {} bytes, smaller than the {}-byte header",
                file_len, HEADER_SIZE
            )));
        }

        let mut reader = BufReader::new(File::open(path)?);
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf)?;
        let header = decode_header(&buf)?;

        let index_offset = u64::from(header.index_offset());
        let table_end = index_offset + u64::from(header.entry_count()) * ENTRY_SIZE as u64;
        if header.entry_count() > 0 && index_offset < HEADER_SIZE as u64 {
            return Err(Error::MalformedArchive(format!(
                "entry table at {} overlaps the header",
                index_offset
            )));
        }
        if table_end > file_len {
            return Err(Error::MalformedArchive(format!(
                "entry table ends at {} but the file is {} bytes",
                table_end, file_len
            )));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        debug!(
            archive = %name,
            entries = header.entry_count(),
            index_offset = header.index_offset(),
            "opened VP archive"
        );

        Ok(Self {
            reader,
            path: path.to_path_buf(),
            name,
            header,
            file_len,
        })
    }

    /// Get the archive file name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the path the archive was opened from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn header(&self) -> &VpHeader {
        &self.header
    }

    /// Number of table records, directory markers included.
    #[inline]
    pub fn entry_count(&self) -> u32 {
        self.header.entry_count()
    }

    /// Iterate over the entry table.
    ///
    /// Each call seeks back to the table and replays it from the start.
    /// Iteration stops after the first error.
    pub fn entries(&mut self, options: &ReadOptions) -> Result<Entries<'_>> {
        self.reader
            .seek(SeekFrom::Start(u64::from(self.header.index_offset())))?;

        Ok(Entries {
            reader: &mut self.reader,
            remaining: self.header.entry_count(),
            index: 0,
            stack: Vec::new(),
            options: options.clone(),
            finished: false,
        })
    }

    /// Read the whole table into a vector.
    pub fn collect_entries(&mut self, options: &ReadOptions) -> Result<Vec<VpEntry>> {
        self.entries(options)?.collect()
    }

    /// Stream a file entry's data in chunks of at most `chunk_size` bytes.
    ///
    /// Exactly `entry.size()` bytes are read, however large the chunk size.
    pub fn stream(&mut self, entry: &VpEntry, chunk_size: usize) -> Result<Chunks<'_>> {
        if entry.is_dir() {
            return Err(Error::NotAFile(PathBuf::from(entry.path())));
        }

        let end = u64::from(entry.offset()) + u64::from(entry.size());
        if end > self.file_len {
            return Err(Error::MalformedArchive(format!(
                "{} ends at {} but the file is {} bytes",
                entry.path(),
                end,
                self.file_len
            )));
        }

        self.reader
            .seek(SeekFrom::Start(u64::from(entry.offset())))?;

        Ok(Chunks {
            reader: &mut self.reader,
            remaining: u64::from(entry.size()),
            chunk_size: chunk_size.max(1),
        })
    }

    /// Copy a file entry's data into `writer`, returning the byte count.
    pub fn copy_to<W: Write>(&mut self, entry: &VpEntry, writer: &mut W) -> Result<u64> {
        let mut written = 0u64;
        for chunk in self.stream(entry, CHUNK_SIZE)? {
            let chunk = chunk?;
            writer.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }

    /// Compute the CRC32 of a file entry's data.
    pub fn crc32(&mut self, entry: &VpEntry) -> Result<u32> {
        let mut crc = Crc32::new();
        for chunk in self.stream(entry, CHUNK_SIZE)? {
            crc.update(&chunk?);
        }
        Ok(crc.finalize())
    }
}

impl std::fmt::Debug for VpArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VpArchive")
            .field("name", &self.name)
            .field("entries", &self.header.entry_count())
            .finish()
    }
}

/// Iterator over the logical entries of an archive.
///
/// Directory stack bookkeeping happens for every record; the filter only
/// decides what is yielded.
pub struct Entries<'a> {
    reader: &'a mut BufReader<File>,
    remaining: u32,
    index: u32,
    stack: Vec<String>,
    options: ReadOptions,
    finished: bool,
}

impl Entries<'_> {
    /// Current directory nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn next_record(&mut self) -> Result<Option<VpEntry>> {
        let mut buf = [0u8; ENTRY_SIZE];
        self.reader.read_exact(&mut buf)?;
        self.remaining -= 1;
        let index = self.index;
        self.index += 1;

        let mut record = decode_entry(&buf)?;

        if record.is_end_marker() {
            if record.size != 0 {
                return Err(Error::MalformedArchive(format!(
                    "record {}: end-of-directory marker with size {}",
                    index, record.size
                )));
            }
            if self.stack.pop().is_none() {
                return Err(Error::MalformedArchive(format!(
                    "record {}: end-of-directory marker with no open directory",
                    index
                )));
            }
            return Ok(None);
        }

        if self.options.lowercase {
            record.name.make_ascii_lowercase();
        }

        let entry = if record.is_directory() {
            self.stack.push(record.name.clone());
            VpEntry::new(
                record.name,
                self.stack.join("/"),
                EntryKind::Directory,
                record.offset,
                0,
                record.timestamp,
            )
        } else {
            let path = if self.stack.is_empty() {
                record.name.clone()
            } else {
                format!("{}/{}", self.stack.join("/"), record.name)
            };
            VpEntry::new(
                record.name,
                path,
                EntryKind::File,
                record.offset,
                record.size,
                record.timestamp,
            )
        };

        if !self.options.matches(entry.path()) {
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<VpEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while self.remaining > 0 {
            match self.next_record() {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }

        self.finished = true;
        if !self.stack.is_empty() {
            return Some(Err(Error::MalformedArchive(format!(
                "{} directories still open at end of table: {}",
                self.stack.len(),
                self.stack.join("/")
            ))));
        }
        None
    }
}

/// Iterator over the data of one entry.
pub struct Chunks<'a> {
    reader: &'a mut BufReader<File>,
    remaining: u64,
    chunk_size: usize,
}

impl Iterator for Chunks<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let want = self.remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; want];
        if let Err(e) = self.reader.read_exact(&mut buf) {
            self.remaining = 0;
            return Some(Err(e.into()));
        }
        self.remaining -= want as u64;
        Some(Ok(buf))
    }
}
