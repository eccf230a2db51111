//! Reconstruction of the backed-up tree from a sequence of backups.
//!
//! Restore builds the [`BackupSum`] of the selected backups and copies each
//! summed file out of the data directory of the backup that last copied it.
//! Like the backup side, per-path copy failures are reported and skipped;
//! only an unusable target or destination aborts the run.

use crate::meta::{BackupMetadata, ReadBackupsCallbacks, read_backups};
use crate::sum::{BackupSum, SumDirectory};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Which backups participate in a restore.
#[derive(Debug, Clone)]
pub enum RestoreSelector {
    /// Restore the latest state: every readable backup.
    Latest,
    /// Restore the state as of the named backup (it and everything older).
    Name(String),
    /// Restore the state as of a point in time.
    AsOf(DateTime<Utc>),
}

/// Fatal restore failure.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// The backup target does not exist or is not a directory.
    #[error("backup target is not an accessible directory: {0}")]
    InvalidTarget(PathBuf),
    /// The backup target could not be enumerated.
    #[error("cannot enumerate backups under {path}: {source}")]
    ReadBackups {
        /// The backup target root.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The destination exists and is not an empty directory.
    #[error("restore destination is not an empty directory: {0}")]
    DestinationNotEmpty(PathBuf),
    /// The destination could not be created or inspected.
    #[error("cannot use restore destination {path}: {source}")]
    Destination {
        /// The restore destination.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// No backup matches the requested name.
    #[error("no backup named {0:?}")]
    BackupNotFound(String),
}

/// Failure hooks for the file-copy phase of a restore. Default to no-ops.
pub struct RestoreFilesCallbacks<'cb> {
    /// Creating a destination directory failed; its subtree is skipped.
    pub on_mkdir_error: Box<dyn FnMut(&Path, &io::Error) + 'cb>,
    /// Copying a single file failed; the file is skipped.
    pub on_copy_error: Box<dyn FnMut(&Path, &Path, &io::Error) + 'cb>,
}

impl Default for RestoreFilesCallbacks<'_> {
    fn default() -> Self {
        Self {
            on_mkdir_error: Box::new(|_, _| {}),
            on_copy_error: Box::new(|_, _, _| {}),
        }
    }
}

/// Progress and failure hooks for [`perform_restore`]. Default to no-ops.
pub struct RestoreCallbacks<'cb> {
    /// Hooks for the backup enumeration step.
    pub read_backups: ReadBackupsCallbacks<'cb>,
    /// The participating backups have been decided.
    pub on_selected_backups: Box<dyn FnMut(&[BackupMetadata]) + 'cb>,
    /// Hooks for the file-copy phase.
    pub restore_files: RestoreFilesCallbacks<'cb>,
}

impl Default for RestoreCallbacks<'_> {
    fn default() -> Self {
        Self {
            read_backups: ReadBackupsCallbacks::default(),
            on_selected_backups: Box::new(|_| {}),
            restore_files: RestoreFilesCallbacks::default(),
        }
    }
}

/// Outcome of a restore run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreResults {
    /// Number of files copied into the destination.
    pub files_restored: usize,
    /// True if any path failed and was skipped.
    pub paths_skipped: bool,
}

/// Restore the backed-up state into an empty `destination` directory.
///
/// # Errors
///
/// Returns [`RestoreError`] if the target is unusable, the destination is
/// not an empty directory, or a named backup does not exist. Per-path copy
/// failures are reported via `callbacks` and set `paths_skipped`.
pub fn perform_restore(
    target: &Path,
    destination: &Path,
    selector: &RestoreSelector,
    callbacks: &mut RestoreCallbacks<'_>,
) -> Result<RestoreResults, RestoreError> {
    if !target.is_dir() {
        return Err(RestoreError::InvalidTarget(target.to_path_buf()));
    }
    prepare_destination(destination)?;

    let backups = read_backups(target, &mut callbacks.read_backups).map_err(|source| {
        RestoreError::ReadBackups {
            path: target.to_path_buf(),
            source,
        }
    })?;
    let selected = select_backups(backups, selector)?;
    (callbacks.on_selected_backups)(&selected);
    debug!(count = selected.len(), "backups selected for restore");

    let backup_sum = BackupSum::from_backups(&selected);
    Ok(restore_files(
        target,
        &backup_sum,
        destination,
        &mut callbacks.restore_files,
    ))
}

/// Ensure the destination exists, is a directory, and is empty.
fn prepare_destination(destination: &Path) -> Result<(), RestoreError> {
    match fs::read_dir(destination) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                return Err(RestoreError::DestinationNotEmpty(destination.to_path_buf()));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(destination).map_err(|source| RestoreError::Destination {
                path: destination.to_path_buf(),
                source,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotADirectory => {
            Err(RestoreError::DestinationNotEmpty(destination.to_path_buf()))
        }
        Err(source) => Err(RestoreError::Destination {
            path: destination.to_path_buf(),
            source,
        }),
    }
}

/// Reduce the backup list according to the selector.
fn select_backups(
    backups: Vec<BackupMetadata>,
    selector: &RestoreSelector,
) -> Result<Vec<BackupMetadata>, RestoreError> {
    match selector {
        RestoreSelector::Latest => Ok(backups),
        RestoreSelector::Name(name) => {
            let cutoff = backups
                .iter()
                .find(|b| &b.name == name)
                .map(|b| b.start_info.start_time)
                .ok_or_else(|| RestoreError::BackupNotFound(name.clone()))?;
            Ok(backups
                .into_iter()
                .filter(|b| b.start_info.start_time <= cutoff)
                .collect())
        }
        RestoreSelector::AsOf(time) => Ok(backups
            .into_iter()
            .filter(|b| b.start_info.start_time <= *time)
            .collect()),
    }
}

/// Copy every summed file from its owning backup into `destination`.
///
/// `destination` must already exist. Failures are reported through
/// `callbacks`; a directory that cannot be created drops its subtree.
pub fn restore_files(
    target: &Path,
    backup_sum: &BackupSum<'_>,
    destination: &Path,
    callbacks: &mut RestoreFilesCallbacks<'_>,
) -> RestoreResults {
    let mut results = RestoreResults {
        files_restored: 0,
        paths_skipped: false,
    };
    restore_directory(
        target,
        &backup_sum.root,
        Path::new(""),
        destination,
        callbacks,
        &mut results,
    );
    results
}

/// Restore one summed directory into `dest_path`.
fn restore_directory(
    target: &Path,
    sum: &SumDirectory<'_>,
    relative_path: &Path,
    dest_path: &Path,
    callbacks: &mut RestoreFilesCallbacks<'_>,
    results: &mut RestoreResults,
) {
    for file in &sum.files {
        let file_relative = relative_path.join(file.name);
        let file_source = file.last_backup.data_path(target).join(&file_relative);
        let file_dest = dest_path.join(file.name);
        match fs::copy(&file_source, &file_dest) {
            Ok(_) => results.files_restored += 1,
            Err(e) => {
                (callbacks.on_copy_error)(&file_source, &file_dest, &e);
                results.paths_skipped = true;
            }
        }
    }

    for sub in &sum.subdirectories {
        let sub_dest = dest_path.join(sub.name);
        if let Err(e) = fs::create_dir(&sub_dest) {
            (callbacks.on_mkdir_error)(&sub_dest, &e);
            results.paths_skipped = true;
            continue;
        }
        restore_directory(
            target,
            sub,
            &relative_path.join(sub.name),
            &sub_dest,
            callbacks,
            results,
        );
    }
}
