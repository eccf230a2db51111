//! Backup metadata: on-disk layout, start/completion info, and enumeration
//! of the backups under a target directory.
//!
//! Each backup is a directory under the backup target root, named by
//! [`generate_backup_name`], containing exactly four entries:
//!
//! ```text
//! <name>/
//!     start.json       when the run began
//!     manifest.json    what the run did (see crate::manifest)
//!     completion.json  when the run finished, and whether paths were skipped
//!     data/            copied file payloads, mirroring the source layout
//! ```

pub mod complete_info;
pub mod start_info;

use crate::manifest::{BackupManifest, ManifestError, read_backup_manifest};
use chrono::Utc;
use start_info::{BackupStartInfo, read_backup_start_info};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the start info file within a backup directory.
pub const START_INFO_FILENAME: &str = "start.json";

/// Name of the manifest file within a backup directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Name of the completion info file within a backup directory.
pub const COMPLETE_INFO_FILENAME: &str = "completion.json";

/// Name of the copied-payload directory within a backup directory.
pub const DATA_DIRNAME: &str = "data";

/// Read/write failure for the small JSON info files.
///
/// Parse failures are distinct from I/O failures so callers can tell a
/// missing file from a corrupt one.
#[derive(Debug, Error)]
pub enum InfoError {
    /// The info file could not be read or written.
    #[error("cannot access backup info file: {0}")]
    Io(#[from] io::Error),
    /// The info file content is not valid.
    #[error("malformed backup info file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure to assemble the metadata of one backup directory.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The backup's start info could not be read.
    #[error("invalid backup start info: {0}")]
    StartInfo(#[from] InfoError),
    /// The backup's manifest could not be read.
    #[error("invalid backup manifest: {0}")]
    Manifest(#[from] ManifestError),
}

/// The loaded metadata of one backup on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupMetadata {
    /// The backup directory's name under the target root.
    pub name: String,
    /// Contents of the backup's start info file.
    pub start_info: BackupStartInfo,
    /// Contents of the backup's manifest file.
    pub manifest: BackupManifest,
}

impl BackupMetadata {
    /// Path of this backup's directory under `backup_root`.
    #[must_use]
    pub fn path(&self, backup_root: &Path) -> PathBuf {
        backup_root.join(&self.name)
    }

    /// Path of this backup's data directory under `backup_root`.
    #[must_use]
    pub fn data_path(&self, backup_root: &Path) -> PathBuf {
        backup_root.join(&self.name).join(DATA_DIRNAME)
    }
}

/// Failure hooks for [`read_backups`]. Default to no-ops.
pub struct ReadBackupsCallbacks<'cb> {
    /// Querying one entry of the backup root failed; the entry is skipped.
    pub on_query_entry_error: Box<dyn FnMut(&Path, &io::Error) + 'cb>,
    /// A backup directory's metadata could not be read; it is skipped.
    pub on_read_metadata_error: Box<dyn FnMut(&Path, &MetadataError) + 'cb>,
}

impl Default for ReadBackupsCallbacks<'_> {
    fn default() -> Self {
        Self {
            on_query_entry_error: Box::new(|_, _| {}),
            on_read_metadata_error: Box::new(|_, _| {}),
        }
    }
}

/// Enumerate and load all backups under `backup_root`.
///
/// Entries that are not directories are ignored. A backup whose metadata
/// cannot be read is reported via `callbacks` and excluded; the enumeration
/// itself continues. Results are not in any particular order.
///
/// # Errors
///
/// Only a failure to list `backup_root` itself is returned.
pub fn read_backups(
    backup_root: &Path,
    callbacks: &mut ReadBackupsCallbacks<'_>,
) -> io::Result<Vec<BackupMetadata>> {
    let mut backups = Vec::new();

    for entry in std::fs::read_dir(backup_root)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                (callbacks.on_query_entry_error)(backup_root, &e);
                continue;
            }
        };
        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => {}
            Ok(_) => continue,
            Err(e) => {
                (callbacks.on_query_entry_error)(&path, &e);
                continue;
            }
        }

        match read_backup_metadata(&path) {
            Ok(metadata) => backups.push(metadata),
            Err(e) => (callbacks.on_read_metadata_error)(&path, &e),
        }
    }

    Ok(backups)
}

/// Load the metadata of a single backup directory.
///
/// # Errors
///
/// Returns [`MetadataError`] if the start info or manifest is missing or
/// malformed.
pub fn read_backup_metadata(backup_path: &Path) -> Result<BackupMetadata, MetadataError> {
    let name = backup_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let start_info = read_backup_start_info(&backup_path.join(START_INFO_FILENAME))?;
    let manifest = read_backup_manifest(&backup_path.join(MANIFEST_FILENAME))?;
    Ok(BackupMetadata {
        name,
        start_info,
        manifest,
    })
}

/// Generate a new backup directory name from the current time.
///
/// The name is the microseconds since the Unix epoch in base 36: ASCII
/// alphanumeric, at least 10 characters, and naturally ordered by creation
/// time for backups more than a microsecond apart.
#[must_use]
pub fn generate_backup_name() -> String {
    let micros = Utc::now().timestamp_micros().max(0) as u64;
    to_base36(micros)
}

/// Render a number in lowercase base 36, zero-padded to 10 digits.
fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
        if value == 0 {
            break;
        }
    }
    while out.len() < 10 {
        out.push(b'0');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::write_backup_manifest;
    use super::start_info::write_backup_start_info;
    use std::fs;
    use tempfile::TempDir;

    fn make_backup(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir_all(dir.join(DATA_DIRNAME)).unwrap();
        write_backup_start_info(&dir.join(START_INFO_FILENAME), &BackupStartInfo::now())
            .unwrap();
        write_backup_manifest(&dir.join(MANIFEST_FILENAME), &BackupManifest::new()).unwrap();
    }

    #[test]
    fn test_generate_backup_name_shape() {
        let name = generate_backup_name();
        assert!(name.len() >= 10);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0000000000");
        assert_eq!(to_base36(35), "000000000z");
        assert_eq!(to_base36(36), "0000000010");
    }

    #[test]
    fn test_read_backups_skips_invalid() {
        let temp = TempDir::new().unwrap();
        make_backup(temp.path(), "good1");
        make_backup(temp.path(), "good2");

        // Not a directory: silently ignored.
        fs::write(temp.path().join("stray.txt"), "x").unwrap();

        // Directory without metadata: reported and skipped.
        fs::create_dir(temp.path().join("broken")).unwrap();

        let mut failed = Vec::new();
        let mut callbacks = ReadBackupsCallbacks {
            on_read_metadata_error: Box::new(|p: &Path, _e: &MetadataError| {
                failed.push(p.to_path_buf());
            }),
            ..Default::default()
        };
        let mut backups = read_backups(temp.path(), &mut callbacks).unwrap();
        drop(callbacks);

        backups.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            backups.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
            ["good1", "good2"]
        );
        assert_eq!(failed, [temp.path().join("broken")]);
    }

    #[test]
    fn test_read_backups_missing_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let result = read_backups(
            &temp.path().join("nope"),
            &mut ReadBackupsCallbacks::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_corrupt_manifest_reported_as_manifest_error() {
        let temp = TempDir::new().unwrap();
        make_backup(temp.path(), "bad");
        fs::write(temp.path().join("bad").join(MANIFEST_FILENAME), "[oops").unwrap();

        let mut kinds = Vec::new();
        let mut callbacks = ReadBackupsCallbacks {
            on_read_metadata_error: Box::new(|_p: &Path, e: &MetadataError| {
                kinds.push(matches!(e, MetadataError::Manifest(_)));
            }),
            ..Default::default()
        };
        let backups = read_backups(temp.path(), &mut callbacks).unwrap();
        drop(callbacks);

        assert!(backups.is_empty());
        assert_eq!(kinds, [true]);
    }
}
