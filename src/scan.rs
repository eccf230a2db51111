//! Read-only filesystem scanning into an in-memory snapshot tree.
//!
//! The scanner walks a source directory, applies [`ExcludePattern`]s, and
//! produces a [`Directory`] tree of files with their modification times.
//! Per-entry failures (an unreadable subdirectory, a metadata call racing a
//! deletion) are reported through [`ScanCallbacks`] and recorded in the
//! aggregate `paths_skipped` flag; only an inaccessible root aborts the scan.

use crate::exclude::{ExcludePattern, is_path_excluded, render_relative_path};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// A regular file discovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File name, without any directory components.
    pub name: String,
    /// Last modification time, in UTC.
    pub last_modified: DateTime<Utc>,
}

/// A directory node in the snapshot tree.
///
/// The root directory of a scan has an empty name. No two direct children
/// (files or subdirectories) share a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    /// Directory name; empty for the scan root.
    pub name: String,
    /// Files directly inside this directory, in name order.
    pub files: Vec<FileEntry>,
    /// Subdirectories, in name order.
    pub subdirectories: Vec<Directory>,
}

impl Directory {
    /// Create an empty directory node.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            subdirectories: Vec::new(),
        }
    }

    /// Total number of files in this directory and all descendants.
    #[must_use]
    pub fn file_count(&self) -> usize {
        // Iterative so a pathologically deep tree cannot blow the stack.
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(dir) = stack.pop() {
            count += dir.files.len();
            stack.extend(dir.subdirectories.iter());
        }
        count
    }
}

/// Failure hooks invoked while scanning.
///
/// All hooks default to no-ops so callers only wire up the failures they
/// care about.
pub struct ScanCallbacks<'cb> {
    /// An entry matched an exclusion pattern and was skipped entirely.
    pub on_exclude: Box<dyn FnMut(&Path) + 'cb>,
    /// Listing a directory failed; its contents are skipped.
    pub on_listdir_error: Box<dyn FnMut(&Path, &io::Error) + 'cb>,
    /// Reading an entry's metadata failed; the entry is skipped.
    pub on_metadata_error: Box<dyn FnMut(&Path, &io::Error) + 'cb>,
}

impl Default for ScanCallbacks<'_> {
    fn default() -> Self {
        Self {
            on_exclude: Box::new(|_| {}),
            on_listdir_error: Box::new(|_, _| {}),
            on_metadata_error: Box::new(|_, _| {}),
        }
    }
}

/// Outcome of a successful scan.
#[derive(Debug)]
pub struct ScanResults {
    /// Snapshot of the scanned tree. The root has an empty name.
    pub tree: Directory,
    /// True if any path was skipped due to a filesystem error.
    ///
    /// Exclusion-pattern skips do not set this flag; they are intentional.
    pub paths_skipped: bool,
}

/// Fatal scan failure: the root itself could not be read.
#[derive(Debug, Error)]
#[error("cannot scan {path}: {source}")]
pub struct ScanError {
    /// The scan root that could not be accessed.
    pub path: String,
    /// The underlying I/O failure.
    #[source]
    pub source: io::Error,
}

/// Scan `root` into a snapshot tree, applying `excludes`.
///
/// The scan is purely read-only. Children are visited in name order so
/// results are reproducible. Excluded directories are never descended into,
/// and `on_exclude` fires once per excluded entry, not per descendant.
///
/// # Errors
///
/// Returns [`ScanError`] only if `root` itself cannot be listed. Every other
/// failure is reported via `callbacks` and sets `paths_skipped`.
pub fn scan_filesystem(
    root: &Path,
    excludes: &[ExcludePattern],
    callbacks: &mut ScanCallbacks<'_>,
) -> Result<ScanResults, ScanError> {
    let mut tree = Directory::new("");
    let mut paths_skipped = false;

    scan_directory(
        root,
        &mut Vec::new(),
        &mut tree,
        excludes,
        callbacks,
        &mut paths_skipped,
        true,
    )
    .map_err(|source| ScanError {
        path: root.display().to_string(),
        source,
    })?;

    Ok(ScanResults {
        tree,
        paths_skipped,
    })
}

/// Scan one directory level into `node`.
///
/// `components` holds the path components below the scan root and is used to
/// render paths for exclusion matching. Returns `Err` only for a root-level
/// listing failure (`is_root`); deeper failures are swallowed into callbacks.
fn scan_directory(
    path: &Path,
    components: &mut Vec<String>,
    node: &mut Directory,
    excludes: &[ExcludePattern],
    callbacks: &mut ScanCallbacks<'_>,
    paths_skipped: &mut bool,
    is_root: bool,
) -> io::Result<()> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if is_root => return Err(e),
        Err(e) => {
            (callbacks.on_listdir_error)(path, &e);
            *paths_skipped = true;
            return Ok(());
        }
    };

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => {
                    // Non-UTF-8 names cannot be represented in the manifest.
                    let err = io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("entry name is not valid UTF-8: {:?}", name),
                    );
                    (callbacks.on_metadata_error)(&path.join(&name), &err);
                    *paths_skipped = true;
                }
            },
            Err(e) => {
                (callbacks.on_listdir_error)(path, &e);
                *paths_skipped = true;
            }
        }
    }
    names.sort_unstable();

    for name in names {
        let entry_path = path.join(&name);

        let metadata = match fs::metadata(&entry_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                (callbacks.on_metadata_error)(&entry_path, &e);
                *paths_skipped = true;
                continue;
            }
        };

        components.push(name.clone());
        let rendered = render_relative_path(components, metadata.is_dir());
        if is_path_excluded(&rendered, excludes) {
            (callbacks.on_exclude)(&entry_path);
            components.pop();
            continue;
        }

        if metadata.is_dir() {
            let mut child = Directory::new(name);
            scan_directory(
                &entry_path,
                components,
                &mut child,
                excludes,
                callbacks,
                paths_skipped,
                false,
            )?;
            node.subdirectories.push(child);
        } else if metadata.is_file() {
            match metadata.modified() {
                Ok(modified) => node.files.push(FileEntry {
                    name,
                    last_modified: DateTime::<Utc>::from(modified),
                }),
                Err(e) => {
                    (callbacks.on_metadata_error)(&entry_path, &e);
                    *paths_skipped = true;
                }
            }
        }
        // Other entry kinds (sockets, devices) are not backed up.
        components.pop();
    }

    Ok(())
}
