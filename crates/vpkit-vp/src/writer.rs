//! VP archive writer.
//!
//! Archives are always rebuilt from a directory tree. Creation runs in two
//! phases: the tree is walked and fully validated into a [`TreePlan`], and
//! only then is anything written to the destination.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::entry::{EntryKind, VpEntry};
use crate::format::{
    encode_entry, encode_header, validate_name, VpHeader, END_OF_DIRECTORY, ENTRY_SIZE,
    HEADER_SIZE,
};
use crate::{Error, Result, CHUNK_SIZE, ROOT_DIR_NAME};

/// Options for [`create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Walk and validate the source, but write nothing.
    pub dry_run: bool,
}

/// What [`create`] did, or would have done in a dry run.
#[derive(Debug, Clone, Default)]
pub struct CreateReport {
    /// Entries in table order, as a reader would yield them.
    pub entries: Vec<VpEntry>,
    pub files: usize,
    pub directories: usize,
    /// Zero-byte source files left out of the archive.
    pub skipped_empty: Vec<PathBuf>,
    /// Size of the finished archive in bytes.
    pub archive_size: u64,
}

/// Build an archive at `destination` from the `data` directory `source`.
pub fn create<P, Q>(source: P, destination: Q, options: &CreateOptions) -> Result<CreateReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    create_with_progress(source, destination, options, |_| {})
}

/// Like [`create`], calling `progress` after each file's data is written.
pub fn create_with_progress<P, Q, F>(
    source: P,
    destination: Q,
    options: &CreateOptions,
    mut progress: F,
) -> Result<CreateReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    F: FnMut(&VpEntry),
{
    let source = source.as_ref();
    let destination = destination.as_ref();

    check_source(source)?;
    if !options.dry_run && destination.exists() {
        return Err(Error::DestinationExists(destination.to_path_buf()));
    }

    let plan = TreePlan::scan(source)?;
    let layout = plan.layout()?;

    let report = CreateReport {
        entries: layout.entries(),
        files: plan.file_count(),
        directories: plan.directory_count(),
        skipped_empty: plan.skipped_empty.clone(),
        archive_size: layout.archive_size,
    };

    if options.dry_run {
        info!(
            files = report.files,
            directories = report.directories,
            size = report.archive_size,
            "dry run, nothing written"
        );
        return Ok(report);
    }

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;

    if let Err(e) = write_archive(file, &layout, &mut progress) {
        // A half-written archive is worse than none.
        if let Err(remove_err) = fs::remove_file(destination) {
            warn!(path = %destination.display(), error = %remove_err, "could not remove partial archive");
        }
        return Err(e);
    }

    info!(
        path = %destination.display(),
        files = report.files,
        directories = report.directories,
        size = report.archive_size,
        "archive written"
    );
    Ok(report)
}

fn check_source(source: &Path) -> Result<()> {
    let metadata = match fs::metadata(source) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotFound(source.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_dir() {
        return Err(Error::NotADirectory(source.to_path_buf()));
    }

    // `.` and trailing components need resolving before the name is known.
    let resolved = fs::canonicalize(source)?;
    if resolved.file_name().and_then(|n| n.to_str()) != Some(ROOT_DIR_NAME) {
        return Err(Error::SourceMustBeNamedData(source.to_path_buf()));
    }
    Ok(())
}

/// One table record to be written.
#[derive(Debug, Clone)]
enum PlannedRecord {
    Directory {
        name: String,
        path: String,
    },
    File {
        name: String,
        path: String,
        source: PathBuf,
        size: u64,
        timestamp: u32,
    },
    EndOfDirectory,
}

/// The validated table of a source tree, in write order.
///
/// Owns the case-insensitive name registry for the duration of one scan.
#[derive(Debug, Default)]
struct TreePlan {
    records: Vec<PlannedRecord>,
    /// Lowercased logical path to the first path that claimed it.
    registry: HashMap<String, String>,
    skipped_empty: Vec<PathBuf>,
}

impl TreePlan {
    fn scan(source: &Path) -> Result<Self> {
        let mut plan = Self::default();
        let mut open: Vec<String> = Vec::new();

        let walker = WalkDir::new(source).follow_links(true).sort_by_file_name();
        for dent in walker {
            let dent = dent.map_err(walk_error)?;

            while open.len() > dent.depth() {
                open.pop();
                plan.records.push(PlannedRecord::EndOfDirectory);
            }

            let name = if dent.depth() == 0 {
                ROOT_DIR_NAME.to_string()
            } else {
                dent.file_name()
                    .to_str()
                    .ok_or_else(|| Error::NonAsciiName(dent.file_name().to_string_lossy().into_owned()))?
                    .to_string()
            };
            let path = if open.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", open.join("/"), name)
            };

            let file_type = dent.file_type();
            if file_type.is_dir() {
                plan.register(&name, &path)?;
                debug!(path = %path, "directory");
                open.push(name.clone());
                plan.records.push(PlannedRecord::Directory { name, path });
            } else if file_type.is_file() {
                let metadata = dent.metadata().map_err(walk_error)?;
                if metadata.len() == 0 {
                    warn!(path = %dent.path().display(), "skipping zero-byte file");
                    plan.skipped_empty.push(dent.path().to_path_buf());
                    continue;
                }
                if metadata.len() > u64::from(u32::MAX) {
                    return Err(Error::ArchiveTooLarge(metadata.len()));
                }
                plan.register(&name, &path)?;

                let timestamp = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
                    .unwrap_or(0);

                debug!(path = %path, size = metadata.len(), "file");
                plan.records.push(PlannedRecord::File {
                    name,
                    path,
                    source: dent.path().to_path_buf(),
                    size: metadata.len(),
                    timestamp,
                });
            } else {
                // Links are already resolved, so this is a socket, fifo or device.
                return Err(Error::NotAFile(dent.path().to_path_buf()));
            }
        }

        while open.pop().is_some() {
            plan.records.push(PlannedRecord::EndOfDirectory);
        }

        Ok(plan)
    }

    fn register(&mut self, name: &str, path: &str) -> Result<()> {
        validate_name(name)?;

        let key = path.to_ascii_lowercase();
        if let Some(first) = self.registry.get(&key) {
            return Err(Error::DuplicateName {
                first: first.clone(),
                second: path.to_string(),
            });
        }
        self.registry.insert(key, path.to_string());
        Ok(())
    }

    fn file_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r, PlannedRecord::File { .. }))
            .count()
    }

    fn directory_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r, PlannedRecord::Directory { .. }))
            .count()
    }

    /// Assign data offsets and check the 32-bit limits.
    fn layout(&self) -> Result<Layout<'_>> {
        let entry_count = self.records.len() as u64;
        if entry_count > u64::from(u32::MAX) {
            return Err(Error::TooManyEntries(entry_count));
        }

        let mut offsets = Vec::with_capacity(self.records.len());
        let mut cursor = HEADER_SIZE as u64;
        for record in &self.records {
            offsets.push(cursor);
            if let PlannedRecord::File { size, .. } = record {
                cursor += size;
            }
        }

        let index_offset = cursor;
        let archive_size = index_offset + entry_count * ENTRY_SIZE as u64;
        if archive_size > u64::from(u32::MAX) {
            return Err(Error::ArchiveTooLarge(archive_size));
        }

        Ok(Layout {
            records: &self.records,
            // Both fit: every offset is below `archive_size`.
            offsets: offsets.into_iter().map(|o| o as u32).collect(),
            index_offset: index_offset as u32,
            entry_count: entry_count as u32,
            archive_size,
        })
    }
}

/// A plan with every offset fixed, ready to write.
struct Layout<'a> {
    records: &'a [PlannedRecord],
    offsets: Vec<u32>,
    index_offset: u32,
    entry_count: u32,
    archive_size: u64,
}

impl Layout<'_> {
    fn entries(&self) -> Vec<VpEntry> {
        self.records
            .iter()
            .zip(&self.offsets)
            .filter_map(|(record, &offset)| match record {
                PlannedRecord::Directory { name, path } => Some(VpEntry::new(
                    name.clone(),
                    path.clone(),
                    EntryKind::Directory,
                    0,
                    0,
                    0,
                )),
                PlannedRecord::File {
                    name,
                    path,
                    size,
                    timestamp,
                    ..
                } => Some(VpEntry::new(
                    name.clone(),
                    path.clone(),
                    EntryKind::File,
                    offset,
                    *size as u32,
                    *timestamp,
                )),
                PlannedRecord::EndOfDirectory => None,
            })
            .collect()
    }

    fn table(&self) -> Result<Vec<u8>> {
        let mut table = Vec::with_capacity(self.records.len() * ENTRY_SIZE);
        for (record, &offset) in self.records.iter().zip(&self.offsets) {
            let bytes = match record {
                PlannedRecord::Directory { name, .. } => encode_entry(0, 0, name, 0)?,
                PlannedRecord::File {
                    name,
                    size,
                    timestamp,
                    ..
                } => encode_entry(offset, *size as u32, name, *timestamp)?,
                PlannedRecord::EndOfDirectory => encode_entry(0, 0, END_OF_DIRECTORY, 0)?,
            };
            table.extend_from_slice(&bytes);
        }
        Ok(table)
    }
}

fn write_archive<F>(file: File, layout: &Layout<'_>, progress: &mut F) -> Result<()>
where
    F: FnMut(&VpEntry),
{
    let mut out = BufWriter::new(file);

    // Placeholder, the real header is written once the table offset is known.
    out.write_all(&[0u8; HEADER_SIZE])?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let entries = layout.entries();
    let mut files = entries.iter().filter(|e| e.is_file());
    for record in layout.records {
        if let PlannedRecord::File { source, size, .. } = record {
            copy_exact(source, *size, &mut out, &mut buf)?;
            if let Some(entry) = files.next() {
                progress(entry);
            }
        }
    }

    out.write_all(&layout.table()?)?;

    out.seek(SeekFrom::Start(0))?;
    out.write_all(&encode_header(&VpHeader::new(
        layout.index_offset,
        layout.entry_count,
    )))?;
    out.flush()?;
    Ok(())
}

/// Copy exactly `size` bytes of `source` in `CHUNK_SIZE` pieces.
fn copy_exact<W: Write>(source: &Path, size: u64, out: &mut W, buf: &mut [u8]) -> Result<()> {
    let mut input = File::open(source)?;
    let mut remaining = size;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let read = input.read(&mut buf[..want])?;
        if read == 0 {
            return Err(Error::SourceChanged(source.to_path_buf()));
        }
        out.write_all(&buf[..read])?;
        remaining -= read as u64;
    }
    Ok(())
}

fn walk_error(e: walkdir::Error) -> Error {
    let msg = e.to_string();
    let io = e
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg));
    Error::Io(io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReadOptions, VpArchive};

    fn touch(path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn sample_tree(root: &Path) -> PathBuf {
        let data = root.join("data");
        touch(&data.join("tables/ships.tbl"), b"#Ship Classes");
        touch(&data.join("tables/weapons.tbl"), b"#Primary Weapons");
        touch(&data.join("maps/ship.dds"), b"DDS |....");
        touch(&data.join("readme.txt"), b"hello");
        touch(&data.join("empty.txt"), b"");
        fs::create_dir_all(data.join("effects")).unwrap();
        data
    }

    fn paths(entries: &[VpEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.path()).collect()
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample_tree(dir.path());
        let dest = dir.path().join("out.vp");

        let report = create(&data, &dest, &CreateOptions::default()).unwrap();
        assert_eq!(report.files, 4);
        assert_eq!(report.directories, 4);
        assert_eq!(report.skipped_empty, vec![data.join("empty.txt")]);
        assert_eq!(report.archive_size, fs::metadata(&dest).unwrap().len());

        let mut archive = VpArchive::open(&dest).unwrap();
        let entries = archive.collect_entries(&ReadOptions::default()).unwrap();
        assert_eq!(entries, report.entries);
        assert_eq!(
            paths(&entries),
            vec![
                "data",
                "data/effects",
                "data/maps",
                "data/maps/ship.dds",
                "data/readme.txt",
                "data/tables",
                "data/tables/ships.tbl",
                "data/tables/weapons.tbl",
            ]
        );

        let ships = &entries[6];
        let mut out = Vec::new();
        archive.copy_to(ships, &mut out).unwrap();
        assert_eq!(out, b"#Ship Classes");
    }

    #[test]
    fn test_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        touch(&data.join("a.txt"), b"aaa");
        touch(&data.join("b.txt"), b"bb");
        let dest = dir.path().join("out.vp");

        create(&data, &dest, &CreateOptions::default()).unwrap();
        let bytes = fs::read(&dest).unwrap();

        // data, a.txt, b.txt, ..
        assert_eq!(&bytes[..4], b"VPVP");
        assert_eq!(&bytes[8..12], &21u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &4u32.to_le_bytes());
        assert_eq!(&bytes[16..21], b"aaabb");
        assert_eq!(bytes.len(), 21 + 4 * ENTRY_SIZE);

        let a = &bytes[21 + ENTRY_SIZE..21 + 2 * ENTRY_SIZE];
        assert_eq!(&a[0..4], &16u32.to_le_bytes());
        assert_eq!(&a[4..8], &3u32.to_le_bytes());
        let b = &bytes[21 + 2 * ENTRY_SIZE..21 + 3 * ENTRY_SIZE];
        assert_eq!(&b[0..4], &19u32.to_le_bytes());
        let marker = &bytes[21 + 3 * ENTRY_SIZE..];
        assert_eq!(&marker[8..11], b"..\0");
    }

    #[test]
    fn test_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        for name in ["zeta.txt", "Alpha.txt", "beta", "alpha.tbl", "_x.txt"] {
            touch(&data.join(name).join("f.txt"), b"x");
        }
        let dest = dir.path().join("out.vp");

        let report = create(&data, &dest, &CreateOptions { dry_run: true }).unwrap();
        let top: Vec<&str> = report
            .entries
            .iter()
            .filter(|e| e.is_dir() && e.parent() == Some("data"))
            .map(|e| e.name())
            .collect();
        assert_eq!(top, vec!["Alpha.txt", "_x.txt", "alpha.tbl", "beta", "zeta.txt"]);
    }

    #[test]
    fn test_case_insensitive_collision() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        touch(&data.join("A.txt"), b"upper");
        touch(&data.join("a.txt"), b"lower");

        let err = create(&data, dir.path().join("out.vp"), &CreateOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateName { ref first, ref second }
                if first == "data/A.txt" && second == "data/a.txt"
        ));
        assert!(!dir.path().join("out.vp").exists());
    }

    #[test]
    fn test_collision_between_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        touch(&data.join("Maps/x.dds"), b"x");
        touch(&data.join("maps"), b"file");

        assert!(matches!(
            create(&data, dir.path().join("out.vp"), &CreateOptions::default()),
            Err(Error::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_name_too_long() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        touch(&data.join("a".repeat(32)), b"x");

        assert!(matches!(
            create(&data, dir.path().join("out.vp"), &CreateOptions::default()),
            Err(Error::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_non_ascii_name() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        touch(&data.join("caf\u{e9}.txt"), b"x");

        assert!(matches!(
            create(&data, dir.path().join("out.vp"), &CreateOptions::default()),
            Err(Error::NonAsciiName(_))
        ));
    }

    #[test]
    fn test_source_checks() {
        let dir = tempfile::tempdir().unwrap();
        let other = dir.path().join("stuff");
        fs::create_dir_all(&other).unwrap();
        touch(&dir.path().join("data.txt"), b"x");

        assert!(matches!(
            create(&other, dir.path().join("out.vp"), &CreateOptions::default()),
            Err(Error::SourceMustBeNamedData(_))
        ));
        assert!(matches!(
            create(dir.path().join("nope"), dir.path().join("out.vp"), &CreateOptions::default()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            create(dir.path().join("data.txt"), dir.path().join("out.vp"), &CreateOptions::default()),
            Err(Error::NotADirectory(_))
        ));
    }

    #[test]
    fn test_destination_exists() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample_tree(dir.path());
        let dest = dir.path().join("out.vp");
        touch(&dest, b"keep me");

        assert!(matches!(
            create(&data, &dest, &CreateOptions::default()),
            Err(Error::DestinationExists(_))
        ));
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");

        // A dry run does not care.
        let report = create(&data, &dest, &CreateOptions { dry_run: true }).unwrap();
        assert_eq!(report.files, 4);
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample_tree(dir.path());
        let dest = dir.path().join("out.vp");

        let report = create(&data, &dest, &CreateOptions { dry_run: true }).unwrap();
        assert!(!dest.exists());
        assert_eq!(report.entries.len(), 8);

        let real = create(&data, &dest, &CreateOptions::default()).unwrap();
        assert_eq!(report.entries, real.entries);
        assert_eq!(report.archive_size, real.archive_size);
    }

    #[test]
    fn test_progress_called_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample_tree(dir.path());
        let dest = dir.path().join("out.vp");

        let mut seen = Vec::new();
        create_with_progress(&data, &dest, &CreateOptions::default(), |e| {
            seen.push(e.path().to_string())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                "data/maps/ship.dds",
                "data/readme.txt",
                "data/tables/ships.tbl",
                "data/tables/weapons.tbl",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_followed() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        touch(&dir.path().join("real.txt"), b"hello");
        touch(&dir.path().join("shared/ships.tbl"), b"#Ship Classes");
        fs::create_dir_all(&data).unwrap();
        symlink(dir.path().join("real.txt"), data.join("link.txt")).unwrap();
        symlink(dir.path().join("shared"), data.join("tables")).unwrap();
        let dest = dir.path().join("out.vp");

        let report = create(&data, &dest, &CreateOptions::default()).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.directories, 2);

        let mut archive = VpArchive::open(&dest).unwrap();
        let entries = archive.collect_entries(&ReadOptions::default()).unwrap();
        assert_eq!(
            paths(&entries),
            vec!["data", "data/link.txt", "data/tables", "data/tables/ships.tbl"]
        );

        let mut out = Vec::new();
        archive.copy_to(&entries[1], &mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_fails() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing.txt"), data.join("gone.txt")).unwrap();
        let dest = dir.path().join("out.vp");

        assert!(matches!(
            create(&data, &dest, &CreateOptions::default()),
            Err(Error::Io(_))
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn test_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        let dest = dir.path().join("out.vp");

        let report = create(&data, &dest, &CreateOptions::default()).unwrap();
        assert_eq!(report.directories, 1);

        let mut archive = VpArchive::open(&dest).unwrap();
        assert_eq!(archive.entry_count(), 2);
        let entries = archive.collect_entries(&ReadOptions::default()).unwrap();
        assert_eq!(paths(&entries), vec!["data"]);
    }
}
