//! End-to-end backup orchestration.
//!
//! [`perform_backup`] wires the whole pipeline together: enumerate previous
//! backups, sum them, initialise a new backup directory, scan the source,
//! plan, execute, and save the metadata. Failures attributable to a single
//! path degrade through the nested callbacks; only failures that invalidate
//! the entire run (unusable source or target, metadata that cannot be
//! written) surface as [`BackupError`].

use crate::exclude::ExcludePattern;
use crate::manifest::{BackupManifest, ManifestError, write_backup_manifest};
use crate::meta::complete_info::{BackupCompleteInfo, write_backup_complete_info};
use crate::meta::start_info::{BackupStartInfo, write_backup_start_info};
use crate::meta::{
    BackupMetadata, DATA_DIRNAME, InfoError, MANIFEST_FILENAME, ReadBackupsCallbacks,
    START_INFO_FILENAME, generate_backup_name, read_backups,
};
use crate::plan::{BackupPlan, ExecutePlanCallbacks, execute_backup_plan};
use crate::scan::{ScanCallbacks, ScanError, scan_filesystem};
use crate::sum::BackupSum;
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Fatal backup failure.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The source path does not exist or is not a directory.
    #[error("source is not an accessible directory: {0}")]
    InvalidSource(PathBuf),
    /// The target path exists but is not a directory.
    #[error("target is not a directory: {0}")]
    InvalidTarget(PathBuf),
    /// The target directory could not be created or listed.
    #[error("cannot use backup target {path}: {source}")]
    Target {
        /// The backup target root.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The new backup directory could not be initialised.
    #[error("cannot initialise backup directory {path}: {source}")]
    Initialise {
        /// The path being created.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The backup's start info could not be written.
    #[error("cannot write backup start info: {0}")]
    WriteStartInfo(#[source] InfoError),
    /// The source tree could not be scanned at all.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// The backup's manifest could not be saved.
    #[error("cannot save backup manifest: {0}")]
    SaveManifest(#[from] ManifestError),
}

/// Progress and failure hooks for [`perform_backup`]. Default to no-ops.
pub struct BackupCallbacks<'cb> {
    /// About to enumerate previous backups under the target.
    pub on_before_read_previous_backups: Box<dyn FnMut() + 'cb>,
    /// Hooks for the previous-backup enumeration.
    pub read_backups: ReadBackupsCallbacks<'cb>,
    /// Previous backups have been loaded.
    pub on_after_read_previous_backups: Box<dyn FnMut(&[BackupMetadata]) + 'cb>,
    /// About to create the new backup directory.
    pub on_before_initialise_backup: Box<dyn FnMut() + 'cb>,
    /// The new backup directory exists.
    pub on_created_backup_directory: Box<dyn FnMut(&Path) + 'cb>,
    /// About to scan the source tree.
    pub on_before_scan_source: Box<dyn FnMut() + 'cb>,
    /// Hooks for the source scan.
    pub scan_source: ScanCallbacks<'cb>,
    /// About to copy files into the backup.
    pub on_before_copy_files: Box<dyn FnMut() + 'cb>,
    /// Hooks for plan execution.
    pub execute_plan: ExecutePlanCallbacks<'cb>,
    /// About to save the manifest and completion info.
    pub on_before_save_metadata: Box<dyn FnMut() + 'cb>,
    /// Writing the completion info failed (the backup is otherwise intact).
    pub on_write_complete_info_error: Box<dyn FnMut(&Path, &InfoError) + 'cb>,
}

impl Default for BackupCallbacks<'_> {
    fn default() -> Self {
        Self {
            on_before_read_previous_backups: Box::new(|| {}),
            read_backups: ReadBackupsCallbacks::default(),
            on_after_read_previous_backups: Box::new(|_| {}),
            on_before_initialise_backup: Box::new(|| {}),
            on_created_backup_directory: Box::new(|_| {}),
            on_before_scan_source: Box::new(|| {}),
            scan_source: ScanCallbacks::default(),
            on_before_copy_files: Box::new(|| {}),
            execute_plan: ExecutePlanCallbacks::default(),
            on_before_save_metadata: Box::new(|| {}),
            on_write_complete_info_error: Box::new(|_, _| {}),
        }
    }
}

/// Outcome of a completed backup run.
#[derive(Debug)]
pub struct BackupResults {
    /// Path of the newly created backup directory.
    pub backup_path: PathBuf,
    /// Start info as written to the backup.
    pub start_info: BackupStartInfo,
    /// Completion info as written (or attempted) to the backup.
    pub complete_info: BackupCompleteInfo,
    /// Manifest as written to the backup.
    pub manifest: BackupManifest,
    /// Number of files copied into the backup.
    pub files_copied: usize,
    /// Number of files recorded as removed.
    pub files_removed: usize,
}

/// Run one incremental backup of `source` into a new directory under
/// `target`.
///
/// The target directory is created if it does not exist. Previous backups
/// under the target define the baseline; only files new or modified since
/// their last copy are copied again.
///
/// # Errors
///
/// Returns [`BackupError`] for failures that invalidate the whole run. All
/// per-path failures are reported via `callbacks` and reflected in the
/// completion info's `paths_skipped` flag.
pub fn perform_backup(
    source: &Path,
    target: &Path,
    excludes: &[ExcludePattern],
    callbacks: &mut BackupCallbacks<'_>,
) -> Result<BackupResults, BackupError> {
    if !source.is_dir() {
        return Err(BackupError::InvalidSource(source.to_path_buf()));
    }
    if target.exists() && !target.is_dir() {
        return Err(BackupError::InvalidTarget(target.to_path_buf()));
    }
    fs::create_dir_all(target).map_err(|source| BackupError::Target {
        path: target.to_path_buf(),
        source,
    })?;

    (callbacks.on_before_read_previous_backups)();
    let previous = read_backups(target, &mut callbacks.read_backups).map_err(|source| {
        BackupError::Target {
            path: target.to_path_buf(),
            source,
        }
    })?;
    (callbacks.on_after_read_previous_backups)(&previous);
    debug!(count = previous.len(), "previous backups loaded");

    (callbacks.on_before_initialise_backup)();
    let name = generate_backup_name();
    let backup_path = target.join(&name);
    fs::create_dir(&backup_path).map_err(|source| BackupError::Initialise {
        path: backup_path.clone(),
        source,
    })?;
    (callbacks.on_created_backup_directory)(&backup_path);

    let start_info = BackupStartInfo::now();
    write_backup_start_info(&backup_path.join(START_INFO_FILENAME), &start_info)
        .map_err(BackupError::WriteStartInfo)?;
    let data_path = backup_path.join(DATA_DIRNAME);
    fs::create_dir(&data_path).map_err(|source| BackupError::Initialise {
        path: data_path.clone(),
        source,
    })?;

    (callbacks.on_before_scan_source)();
    let scan = scan_filesystem(source, excludes, &mut callbacks.scan_source)?;

    let backup_sum = BackupSum::from_backups(&previous);
    let plan = BackupPlan::new(&scan.tree, &backup_sum);

    (callbacks.on_before_copy_files)();
    let execution = execute_backup_plan(&plan, source, &data_path, &mut callbacks.execute_plan);
    debug!(
        files_copied = execution.files_copied,
        files_removed = execution.files_removed,
        "backup plan executed"
    );

    (callbacks.on_before_save_metadata)();
    write_backup_manifest(&backup_path.join(MANIFEST_FILENAME), &execution.manifest)?;

    let complete_info = BackupCompleteInfo {
        end_time: Utc::now(),
        paths_skipped: scan.paths_skipped || execution.paths_skipped,
    };
    let complete_info_path = backup_path.join(crate::meta::COMPLETE_INFO_FILENAME);
    if let Err(e) = write_backup_complete_info(&complete_info_path, &complete_info) {
        // The backup data and manifest are intact; losing the completion
        // marker is reported but not fatal.
        (callbacks.on_write_complete_info_error)(&complete_info_path, &e);
    }

    Ok(BackupResults {
        backup_path,
        start_info,
        complete_info,
        manifest: execution.manifest,
        files_copied: execution.files_copied,
        files_removed: execution.files_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::COMPLETE_INFO_FILENAME;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn dir_entries(path: &Path) -> BTreeSet<String> {
        fs::read_dir(path)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn run(source: &Path, target: &Path) -> BackupResults {
        perform_backup(source, target, &[], &mut BackupCallbacks::default()).unwrap()
    }

    #[test]
    fn test_backup_nonexistent_source_fails() {
        let temp = TempDir::new().unwrap();
        let result = perform_backup(
            &temp.path().join("missing"),
            &temp.path().join("target"),
            &[],
            &mut BackupCallbacks::default(),
        );
        assert!(matches!(result, Err(BackupError::InvalidSource(_))));
        // A failed validation must not create the target.
        assert!(!temp.path().join("target").exists());
    }

    #[test]
    fn test_backup_source_is_file_fails() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        fs::write(&source, "not a directory").unwrap();

        let result = perform_backup(
            &source,
            &temp.path().join("target"),
            &[],
            &mut BackupCallbacks::default(),
        );
        assert!(matches!(result, Err(BackupError::InvalidSource(_))));
    }

    #[test]
    fn test_first_backup_copies_everything() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let target = temp.path().join("target");
        fs::create_dir_all(source.join("docs")).unwrap();
        fs::write(source.join("a.txt"), "alpha").unwrap();
        fs::write(source.join("docs/b.txt"), "beta").unwrap();

        let results = run(&source, &target);

        assert_eq!(results.files_copied, 2);
        assert_eq!(results.files_removed, 0);
        assert!(!results.complete_info.paths_skipped);

        let name = results
            .backup_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.len() >= 10 && name.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(
            dir_entries(&results.backup_path),
            ["data", "start.json", "manifest.json", "completion.json"]
                .iter()
                .map(ToString::to_string)
                .collect()
        );
        assert_eq!(
            fs::read_to_string(results.backup_path.join("data/docs/b.txt")).unwrap(),
            "beta"
        );
        assert_eq!(results.manifest.root.copied_files, ["a.txt"]);
    }

    #[test]
    fn test_second_backup_copies_only_changes() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let target = temp.path().join("target");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("stable.txt"), "same").unwrap();
        fs::write(source.join("victim.txt"), "doomed").unwrap();

        let first = run(&source, &target);
        assert_eq!(first.files_copied, 2);

        // Age the unchanged file's mtime to before the first backup so it
        // does not look modified.
        let old = filetime::FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(source.join("stable.txt"), old).unwrap();
        fs::remove_file(source.join("victim.txt")).unwrap();
        fs::write(source.join("fresh.txt"), "new").unwrap();

        let second = run(&source, &target);

        assert_eq!(second.files_copied, 1);
        assert_eq!(second.files_removed, 1);
        assert_eq!(second.manifest.root.copied_files, ["fresh.txt"]);
        assert_eq!(second.manifest.root.removed_files, ["victim.txt"]);
        assert_eq!(dir_entries(&second.backup_path.join("data")), ["fresh.txt"]
            .iter()
            .map(ToString::to_string)
            .collect());
    }

    #[test]
    fn test_backup_fires_lifecycle_callbacks_in_order() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let target = temp.path().join("target");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("f"), "x").unwrap();

        // Shared via RefCell: each callback is a separate boxed closure.
        let order_cell = std::cell::RefCell::new(Vec::<&'static str>::new());
        let mut callbacks = BackupCallbacks {
            on_before_read_previous_backups: Box::new(|| {
                order_cell.borrow_mut().push("read_previous")
            }),
            on_after_read_previous_backups: Box::new(|backups| {
                assert!(backups.is_empty());
                order_cell.borrow_mut().push("after_read_previous");
            }),
            on_before_initialise_backup: Box::new(|| order_cell.borrow_mut().push("initialise")),
            on_created_backup_directory: Box::new(|_| {
                order_cell.borrow_mut().push("created_directory")
            }),
            on_before_scan_source: Box::new(|| order_cell.borrow_mut().push("scan")),
            on_before_copy_files: Box::new(|| order_cell.borrow_mut().push("copy")),
            on_before_save_metadata: Box::new(|| order_cell.borrow_mut().push("save_metadata")),
            ..Default::default()
        };
        perform_backup(&source, &target, &[], &mut callbacks).unwrap();
        drop(callbacks);

        assert_eq!(
            order_cell.into_inner(),
            [
                "read_previous",
                "after_read_previous",
                "initialise",
                "created_directory",
                "scan",
                "copy",
                "save_metadata"
            ]
        );
    }

    #[test]
    fn test_backup_with_excluded_directory_records_removal() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let target = temp.path().join("target");
        fs::create_dir_all(source.join("cache")).unwrap();
        fs::write(source.join("cache/blob"), "x").unwrap();
        fs::write(source.join("keep.txt"), "x").unwrap();

        // First backup includes the cache directory.
        let first = run(&source, &target);
        assert_eq!(first.files_copied, 2);

        // Second backup excludes it, so it reads as removed.
        let excludes = [ExcludePattern::new("/cache/").unwrap()];
        let results = perform_backup(
            &source,
            &target,
            &excludes,
            &mut BackupCallbacks::default(),
        )
        .unwrap();

        assert_eq!(results.manifest.root.removed_directories, ["cache"]);
        assert_eq!(results.files_removed, 1);
    }

    #[test]
    fn test_completion_info_written() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let target = temp.path().join("target");
        fs::create_dir_all(&source).unwrap();

        let results = run(&source, &target);
        let on_disk = crate::meta::complete_info::read_backup_complete_info(
            &results.backup_path.join(COMPLETE_INFO_FILENAME),
        )
        .unwrap();
        assert_eq!(on_disk, results.complete_info);
    }
}
