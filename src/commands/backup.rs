//! The `tide backup` command.

use crate::backup::{BackupCallbacks, perform_backup};
use crate::exclude::compile_exclude_patterns;
use crate::lock::TargetLock;
use crate::plan::ExecutePlanCallbacks;
use crate::scan::ScanCallbacks;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Run a backup of `source` into `target`.
pub fn execute(source: &str, target: &str, exclude_patterns: &[String]) -> Result<()> {
    let excludes = compile_exclude_patterns(exclude_patterns)
        .map_err(|(pattern, e)| anyhow::anyhow!("Invalid exclude pattern {pattern:?}: {e}"))?;

    let source = Path::new(source);
    let target = Path::new(target);
    let _lock = TargetLock::acquire(target)
        .with_context(|| format!("Failed to lock backup target {}", target.display()))?;

    let mut callbacks = BackupCallbacks {
        on_created_backup_directory: Box::new(|path: &Path| {
            super::print_info(&format!("Created backup {}", path.display()));
        }),
        scan_source: ScanCallbacks {
            on_exclude: Box::new(|path: &Path| {
                debug!("excluded {}", path.display());
            }),
            on_listdir_error: Box::new(|path, e| {
                super::print_warning(&format!("Cannot list {}: {e}", path.display()));
            }),
            on_metadata_error: Box::new(|path, e| {
                super::print_warning(&format!("Cannot read metadata of {}: {e}", path.display()));
            }),
        },
        execute_plan: ExecutePlanCallbacks {
            on_mkdir_error: Box::new(|path, e| {
                super::print_warning(&format!("Cannot create {}: {e}", path.display()));
            }),
            on_copy_error: Box::new(|src, _dest, e| {
                super::print_warning(&format!("Cannot copy {}: {e}", src.display()));
            }),
        },
        on_write_complete_info_error: Box::new(|path, e| {
            super::print_warning(&format!(
                "Cannot write completion info {}: {e}",
                path.display()
            ));
        }),
        ..Default::default()
    };

    let results = perform_backup(source, target, &excludes, &mut callbacks)?;

    super::print_success(&format!(
        "Backup complete: {} file(s) copied, {} removal(s) recorded",
        results.files_copied, results.files_removed
    ));
    if results.complete_info.paths_skipped {
        super::print_warning("Some paths were skipped; see warnings above");
    }
    Ok(())
}
