//! Deletion of historically useless backups.
//!
//! A backup is worth keeping only while it carries information: files it
//! copied, removals it recorded, or data some restore might want. The prune
//! engine reads every backup under a target root, selects the ones that are
//! safe to delete under the configured policy, and removes them with
//! per-path error accounting — one undeletable file never aborts the run,
//! it just keeps that backup out of the removed tally.

use crate::meta::{
    BackupMetadata, COMPLETE_INFO_FILENAME, DATA_DIRNAME, MANIFEST_FILENAME,
    ReadBackupsCallbacks, START_INFO_FILENAME, read_backups,
};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Policy switches for one prune run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneConfig {
    /// Delete backups whose manifest records nothing and whose data
    /// directory is empty.
    pub prune_empty: bool,
    /// Delete qualifying backups even when their directory contains entries
    /// other than the expected four. Off by default: unrecognised data is a
    /// reason to preserve a backup.
    pub prune_other_data: bool,
    /// Select and report, but delete nothing.
    pub dry_run: bool,
}

/// Aggregate counts from one prune run.
///
/// `empty_backups_removed` and `total_backups_removed` are equal today;
/// they are tracked separately so future prunability classes keep their own
/// tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneResults {
    /// Backups removed because they were empty.
    pub empty_backups_removed: usize,
    /// All backups removed, across every prunability class.
    pub total_backups_removed: usize,
    /// Backups still present after the run.
    pub backups_remaining: usize,
}

/// Fatal prune failure: the backup root itself could not be enumerated.
#[derive(Debug, Error)]
#[error("cannot enumerate backups under {path}: {source}")]
pub struct PruneError {
    /// The backup root that could not be listed.
    pub path: String,
    /// The underlying I/O failure.
    #[source]
    pub source: io::Error,
}

/// Failure and observability hooks for [`prune_backups`]. Default to no-ops.
pub struct PruneCallbacks<'cb> {
    /// Hooks for the backup enumeration step.
    pub read_backups: ReadBackupsCallbacks<'cb>,
    /// A prunability check failed for a backup; it is left alone.
    pub on_check_error: Box<dyn FnMut(&Path, &io::Error) + 'cb>,
    /// The prunable set has been decided, before any deletion happens.
    pub on_selected_backups: Box<dyn FnMut(&[&BackupMetadata]) + 'cb>,
    /// Deleting a single path failed; its backup is not counted as removed.
    pub on_delete_error: Box<dyn FnMut(&Path, &io::Error) + 'cb>,
}

impl Default for PruneCallbacks<'_> {
    fn default() -> Self {
        Self {
            read_backups: ReadBackupsCallbacks::default(),
            on_check_error: Box::new(|_, _| {}),
            on_selected_backups: Box::new(|_| {}),
            on_delete_error: Box::new(|_, _| {}),
        }
    }
}

/// Delete historically useless backups under `backup_root`.
///
/// Backups that cannot be read or checked are reported via `callbacks` and
/// left untouched. With `dry_run` the returned counts describe what would
/// have been removed.
///
/// # Errors
///
/// Returns [`PruneError`] only if `backup_root` itself cannot be listed.
pub fn prune_backups(
    backup_root: &Path,
    config: &PruneConfig,
    callbacks: &mut PruneCallbacks<'_>,
) -> Result<PruneResults, PruneError> {
    let backups =
        read_backups(backup_root, &mut callbacks.read_backups).map_err(|source| PruneError {
            path: backup_root.display().to_string(),
            source,
        })?;
    let backups_found = backups.len();

    let prunable: Vec<&BackupMetadata> = backups
        .iter()
        .filter(|backup| is_backup_prunable(backup_root, backup, config, callbacks))
        .collect();
    (callbacks.on_selected_backups)(&prunable);
    debug!(
        found = backups_found,
        prunable = prunable.len(),
        dry_run = config.dry_run,
        "prunable backups selected"
    );

    let mut empty_backups_removed = 0;
    for backup in &prunable {
        if config.dry_run || remove_tree(&backup.path(backup_root), &mut callbacks.on_delete_error)
        {
            empty_backups_removed += 1;
        }
    }

    // Emptiness is the only prunability class today.
    let total_backups_removed = empty_backups_removed;
    Ok(PruneResults {
        empty_backups_removed,
        total_backups_removed,
        backups_remaining: backups_found - total_backups_removed,
    })
}

/// Decide whether one backup may be deleted under the configured policy.
///
/// Check failures are reported via `on_check_error` and make the backup
/// non-prunable (unknown state is preserved, never deleted).
fn is_backup_prunable(
    backup_root: &Path,
    backup: &BackupMetadata,
    config: &PruneConfig,
    callbacks: &mut PruneCallbacks<'_>,
) -> bool {
    if !config.prune_empty {
        return false;
    }
    if !backup.manifest.root.records_nothing() {
        return false;
    }

    let data_path = backup.data_path(backup_root);
    match directory_is_empty(&data_path) {
        Ok(true) => {}
        Ok(false) => return false,
        Err(e) => {
            (callbacks.on_check_error)(&data_path, &e);
            return false;
        }
    }

    if !config.prune_other_data {
        let backup_path = backup.path(backup_root);
        match has_foreign_entries(&backup_path) {
            Ok(false) => {}
            Ok(true) => return false,
            Err(e) => {
                (callbacks.on_check_error)(&backup_path, &e);
                return false;
            }
        }
    }

    true
}

/// True if the directory has no entries at all.
fn directory_is_empty(path: &Path) -> io::Result<bool> {
    let mut entries = fs::read_dir(path)?;
    match entries.next() {
        None => Ok(true),
        Some(Ok(_)) => Ok(false),
        Some(Err(e)) => Err(e),
    }
}

/// True if the backup directory holds anything beyond the expected four
/// entries (start info, manifest, completion info, data directory).
fn has_foreign_entries(backup_path: &Path) -> io::Result<bool> {
    const EXPECTED: [&str; 4] = [
        START_INFO_FILENAME,
        MANIFEST_FILENAME,
        COMPLETE_INFO_FILENAME,
        DATA_DIRNAME,
    ];

    for entry in fs::read_dir(backup_path)? {
        let entry = entry?;
        let name = entry.file_name();
        if !EXPECTED.iter().any(|e| name == *e) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Recursively delete a directory tree, reporting every failing path.
///
/// Returns true only if the whole tree was removed. Failures do not stop
/// the walk; every deletable entry is still deleted.
fn remove_tree(path: &Path, on_delete_error: &mut Box<dyn FnMut(&Path, &io::Error) + '_>) -> bool {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            (on_delete_error)(path, &e);
            return false;
        }
    };

    let mut complete = true;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                (on_delete_error)(path, &e);
                complete = false;
                continue;
            }
        };
        let entry_path = entry.path();
        let is_dir = match entry.file_type() {
            Ok(file_type) => file_type.is_dir(),
            Err(e) => {
                (on_delete_error)(&entry_path, &e);
                complete = false;
                continue;
            }
        };
        if is_dir {
            complete &= remove_tree(&entry_path, on_delete_error);
        } else if let Err(e) = fs::remove_file(&entry_path) {
            (on_delete_error)(&entry_path, &e);
            complete = false;
        }
    }

    if complete {
        if let Err(e) = fs::remove_dir(path) {
            (on_delete_error)(path, &e);
            complete = false;
        }
    }
    complete
}
