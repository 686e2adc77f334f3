//! Extraction of archive entries to disk or to a byte sink.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::{debug, info, warn};

use crate::archive::{ReadOptions, VpArchive};
use crate::entry::VpEntry;
use crate::{Error, Result};

/// Options for [`extract`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Replace files that already exist at the target path.
    pub overwrite: bool,
    /// Set each extracted file's modification time from the archive.
    pub restore_mtime: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            restore_mtime: true,
        }
    }
}

/// Outcome of an extraction run.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
    /// Existing files left alone because `overwrite` was off.
    pub skipped_existing: Vec<PathBuf>,
    /// Entries skipped because of [`Error::OnDiskConflict`].
    pub conflicts: Vec<Error>,
}

/// Extract every entry selected by `read` below `destination`.
pub fn extract<P: AsRef<Path>>(
    archive: &mut VpArchive,
    destination: P,
    read: &ReadOptions,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    extract_with_progress(archive, destination, read, options, |_| {})
}

/// Like [`extract`], calling `progress` after each entry is handled.
///
/// On-disk conflicts are logged, recorded in the report and skipped; any
/// other error aborts the run.
pub fn extract_with_progress<P, F>(
    archive: &mut VpArchive,
    destination: P,
    read: &ReadOptions,
    options: &ExtractOptions,
    mut progress: F,
) -> Result<ExtractReport>
where
    P: AsRef<Path>,
    F: FnMut(&VpEntry),
{
    let destination = destination.as_ref();
    let entries = archive.collect_entries(read)?;
    let mut report = ExtractReport::default();

    fs::create_dir_all(destination)?;

    for entry in &entries {
        check_components(entry)?;
        let target = destination.join(entry.output_path());

        match extract_entry(archive, entry, destination, &target, options, &mut report) {
            Ok(()) => {}
            Err(e @ Error::OnDiskConflict { .. }) => {
                warn!("{}, skipping {}", e, entry.path());
                report.conflicts.push(e);
            }
            Err(e) => return Err(e),
        }
        progress(entry);
    }

    info!(
        archive = archive.name(),
        files = report.files,
        directories = report.directories,
        bytes = report.bytes,
        conflicts = report.conflicts.len(),
        "extraction finished"
    );
    Ok(report)
}

fn extract_entry(
    archive: &mut VpArchive,
    entry: &VpEntry,
    destination: &Path,
    target: &Path,
    options: &ExtractOptions,
    report: &mut ExtractReport,
) -> Result<()> {
    check_ancestors(destination, target)?;

    if entry.is_dir() {
        match existing_kind(target) {
            Some("directory") => {}
            Some(kind) => return Err(conflict(target, kind)),
            None => fs::create_dir_all(target)?,
        }
        report.directories += 1;
        return Ok(());
    }

    match existing_kind(target) {
        None => {}
        Some("file") if options.overwrite => {}
        Some("file") => {
            debug!(path = %target.display(), "exists, not overwriting");
            report.skipped_existing.push(target.to_path_buf());
            return Ok(());
        }
        Some(kind) => return Err(conflict(target, kind)),
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = BufWriter::new(File::create(target)?);
    let written = archive.copy_to(entry, &mut out)?;
    out.flush()?;
    drop(out);

    if options.restore_mtime {
        let mtime = FileTime::from_unix_time(i64::from(entry.timestamp()), 0);
        filetime::set_file_mtime(target, mtime)?;
    }

    debug!(path = %target.display(), bytes = written, "extracted");
    report.files += 1;
    report.bytes += written;
    Ok(())
}

/// Reject paths that could land outside the destination.
fn check_components(entry: &VpEntry) -> Result<()> {
    for component in entry.path().split('/') {
        if component.is_empty() || component == "." || component == ".." || component.contains('\\') {
            return Err(Error::MalformedArchive(format!(
                "unsafe path component {:?} in {}",
                component,
                entry.path()
            )));
        }
    }
    Ok(())
}

/// Every directory between `destination` and `target` must be a directory
/// if it exists.
fn check_ancestors(destination: &Path, target: &Path) -> Result<()> {
    let mut blocking = None;
    for ancestor in target.ancestors().skip(1) {
        if ancestor == destination {
            break;
        }
        if let Some(kind) = existing_kind(ancestor) {
            if kind != "directory" {
                blocking = Some((ancestor, kind));
            }
        }
    }
    match blocking {
        Some((path, kind)) => Err(conflict(path, kind)),
        None => Ok(()),
    }
}

fn existing_kind(path: &Path) -> Option<&'static str> {
    let metadata = fs::symlink_metadata(path).ok()?;
    let file_type = metadata.file_type();
    Some(if file_type.is_dir() {
        "directory"
    } else if file_type.is_file() {
        "file"
    } else {
        "special file"
    })
}

fn conflict(path: &Path, existing: &'static str) -> Error {
    Error::OnDiskConflict {
        path: path.to_path_buf(),
        existing,
    }
}

/// Write the data of every file entry selected by `read` to `writer`.
///
/// Returns the number of bytes written. A closed pipe on the other end ends
/// the run early without an error.
pub fn pipe<W: Write>(archive: &mut VpArchive, read: &ReadOptions, writer: &mut W) -> Result<u64> {
    let entries = archive.collect_entries(read)?;
    let mut total = 0;

    for entry in entries.iter().filter(|e| e.is_file()) {
        match archive.copy_to(entry, writer) {
            Ok(written) => total += written,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("output closed after {} bytes", total);
                return Ok(total);
            }
            Err(e) => return Err(e),
        }
    }

    match writer.flush() {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(total),
        other => other.map(|()| total).map_err(Error::from),
    }
}
