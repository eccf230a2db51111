//! The `tide prune` command.

use crate::lock::TargetLock;
use crate::meta::{BackupMetadata, ReadBackupsCallbacks};
use crate::prune::{PruneCallbacks, PruneConfig, prune_backups};
use anyhow::{Context, Result};
use std::path::Path;

/// Delete (or with `dry_run`, just report) useless backups under `target`.
pub fn execute(target: &str, prune_other_data: bool, dry_run: bool) -> Result<()> {
    let target = Path::new(target);
    anyhow::ensure!(
        target.is_dir(),
        "Backup target is not a directory: {}",
        target.display()
    );
    let _lock = TargetLock::acquire(target)
        .with_context(|| format!("Failed to lock backup target {}", target.display()))?;

    let config = PruneConfig {
        prune_empty: true,
        prune_other_data,
        dry_run,
    };

    let mut callbacks = PruneCallbacks {
        read_backups: ReadBackupsCallbacks {
            on_query_entry_error: Box::new(|path, e| {
                super::print_warning(&format!("Cannot query {}: {e}", path.display()));
            }),
            on_read_metadata_error: Box::new(|path, e| {
                super::print_warning(&format!("Skipping unreadable backup {}: {e}", path.display()));
            }),
        },
        on_check_error: Box::new(|path, e| {
            super::print_warning(&format!("Cannot check {}: {e}", path.display()));
        }),
        on_selected_backups: Box::new(|backups: &[&BackupMetadata]| {
            for backup in backups {
                if dry_run {
                    super::print_info(&format!("Would remove {}", backup.name));
                } else {
                    super::print_info(&format!("Removing {}", backup.name));
                }
            }
        }),
        on_delete_error: Box::new(|path, e| {
            super::print_warning(&format!("Cannot delete {}: {e}", path.display()));
        }),
    };

    let results = prune_backups(target, &config, &mut callbacks)?;

    if dry_run {
        super::print_success(&format!(
            "Dry run: {} empty backup(s) would be removed, {} would remain",
            results.empty_backups_removed, results.backups_remaining
        ));
    } else {
        super::print_success(&format!(
            "Removed {} empty backup(s), {} backup(s) remain",
            results.empty_backups_removed, results.backups_remaining
        ));
    }
    Ok(())
}
