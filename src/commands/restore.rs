//! The `tide restore` command.

use crate::lock::TargetLock;
use crate::meta::{BackupMetadata, ReadBackupsCallbacks};
use crate::restore::{RestoreCallbacks, RestoreFilesCallbacks, RestoreSelector, perform_restore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Restore backed-up state from `target` into `destination`.
pub fn execute(
    target: &str,
    destination: &str,
    backup_name: Option<&str>,
    as_of: Option<&str>,
) -> Result<()> {
    let selector = match (backup_name, as_of) {
        (Some(name), _) => RestoreSelector::Name(name.to_string()),
        (None, Some(time)) => {
            let time = DateTime::parse_from_rfc3339(time)
                .with_context(|| format!("Invalid --as-of time {time:?}"))?;
            RestoreSelector::AsOf(time.with_timezone(&Utc))
        }
        (None, None) => RestoreSelector::Latest,
    };

    let target = Path::new(target);
    anyhow::ensure!(
        target.is_dir(),
        "Backup target is not a directory: {}",
        target.display()
    );
    let _lock = TargetLock::acquire(target)
        .with_context(|| format!("Failed to lock backup target {}", target.display()))?;

    let mut callbacks = RestoreCallbacks {
        read_backups: ReadBackupsCallbacks {
            on_query_entry_error: Box::new(|path, e| {
                super::print_warning(&format!("Cannot query {}: {e}", path.display()));
            }),
            on_read_metadata_error: Box::new(|path, e| {
                super::print_warning(&format!("Skipping unreadable backup {}: {e}", path.display()));
            }),
        },
        on_selected_backups: Box::new(|backups: &[BackupMetadata]| {
            super::print_info(&format!("Restoring from {} backup(s)", backups.len()));
        }),
        restore_files: RestoreFilesCallbacks {
            on_mkdir_error: Box::new(|path, e| {
                super::print_warning(&format!("Cannot create {}: {e}", path.display()));
            }),
            on_copy_error: Box::new(|src, _dest, e| {
                super::print_warning(&format!("Cannot restore {}: {e}", src.display()));
            }),
        },
    };

    let results = perform_restore(target, Path::new(destination), &selector, &mut callbacks)?;

    super::print_success(&format!("Restored {} file(s)", results.files_restored));
    if results.paths_skipped {
        super::print_warning("Some files could not be restored; see warnings above");
    }
    Ok(())
}
