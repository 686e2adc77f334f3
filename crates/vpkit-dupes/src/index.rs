//! Cross-archive file index.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use vpkit_vp::{ReadOptions, VpArchive, VpEntry};
use walkdir::WalkDir;

use crate::path_type::path_type;
use crate::{Error, Result};

/// One archive in the load list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// File name, used to label results.
    pub name: String,
    pub path: PathBuf,
}

/// Files that compete for the same lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DupKey {
    pub path_type: String,
    pub name: String,
}

/// A file found in one container.
#[derive(Debug, Clone)]
pub struct Occurrence {
    /// Index into [`LoadIndex::containers`].
    pub container: usize,
    pub entry: VpEntry,
}

/// Collect the `.vp` files in each search directory, in load order.
///
/// Directories are taken in the order given; within one directory archives
/// load in file name order.
pub fn discover<P: AsRef<Path>>(search_dirs: &[P]) -> Result<Vec<Container>> {
    // Fail before any scanning starts.
    for dir in search_dirs {
        let dir = dir.as_ref();
        if !fs::metadata(dir).map(|m| m.is_dir()).unwrap_or(false) {
            return Err(Error::SearchDirNotFound(dir.to_path_buf()));
        }
    }

    let mut containers = Vec::new();
    for dir in search_dirs {
        let walker = WalkDir::new(dir.as_ref())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for dent in walker {
            let dent = dent.map_err(walk_error)?;
            let is_vp = dent
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("vp"));
            if !dent.file_type().is_file() || !is_vp {
                continue;
            }

            containers.push(Container {
                name: dent.file_name().to_string_lossy().into_owned(),
                path: dent.path().to_path_buf(),
            });
        }
    }

    Ok(containers)
}

fn walk_error(e: walkdir::Error) -> Error {
    let msg = e.to_string();
    let io = e
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg));
    Error::Io(io)
}

/// Every file of every container, grouped by [`DupKey`].
///
/// Keys and their occurrences keep the order in which the scan met them,
/// which is load order.
#[derive(Debug, Default)]
pub struct LoadIndex {
    containers: Vec<Container>,
    groups: Vec<(DupKey, Vec<Occurrence>)>,
    lookup: HashMap<DupKey, usize>,
    /// Scan position at which each logical path was first met.
    first_seen: HashMap<String, usize>,
}

impl LoadIndex {
    /// Scan each container in order.
    ///
    /// Names are folded to lowercase, as the engine matches them without
    /// regard to case. A malformed archive aborts the scan.
    pub fn build(containers: Vec<Container>) -> Result<Self> {
        let mut index = Self {
            containers,
            ..Self::default()
        };
        let options = ReadOptions::default().lowercase(true);

        for container in 0..index.containers.len() {
            let mut archive = VpArchive::open(&index.containers[container].path)?;
            let mut files = 0usize;

            for entry in archive.entries(&options)? {
                let entry = entry?;
                if entry.is_dir() {
                    continue;
                }
                files += 1;
                index.insert(container, entry);
            }

            info!(archive = archive.name(), files, "scanned");
        }

        Ok(index)
    }

    fn insert(&mut self, container: usize, entry: VpEntry) {
        let next = self.first_seen.len();
        self.first_seen.entry(entry.path().to_string()).or_insert(next);

        let kind = path_type(entry.parent().unwrap_or(""));
        if kind.is_empty() {
            debug!(path = entry.path(), "outside data, not indexed");
            return;
        }

        let key = DupKey {
            path_type: kind.to_string(),
            name: entry.name().to_string(),
        };
        let slot = match self.lookup.get(&key) {
            Some(&slot) => slot,
            None => {
                self.groups.push((key.clone(), Vec::new()));
                self.lookup.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[slot].1.push(Occurrence { container, entry });
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Name of the container at `index`.
    pub fn container_name(&self, index: usize) -> &str {
        &self.containers[index].name
    }

    /// Scan position at which `path` was first met.
    pub fn first_seen(&self, path: &str) -> usize {
        self.first_seen.get(path).copied().unwrap_or(usize::MAX)
    }

    /// Keys found in more than one container, in scan order.
    ///
    /// A key is left out when every container holding it is in `exclude`.
    pub fn candidates<'a>(
        &'a self,
        exclude: &'a HashSet<String>,
    ) -> impl Iterator<Item = (&'a DupKey, &'a [Occurrence])> + 'a {
        self.groups.iter().filter_map(move |(key, occurrences)| {
            let mut holders: Vec<usize> = occurrences.iter().map(|o| o.container).collect();
            holders.dedup();
            if holders.len() < 2 {
                return None;
            }
            if holders
                .iter()
                .all(|&c| exclude.contains(self.container_name(c)))
            {
                debug!(key = ?key, "all holders excluded");
                return None;
            }
            Some((key, occurrences.as_slice()))
        })
    }
}
