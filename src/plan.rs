//! Backup planning and execution.
//!
//! A [`BackupPlan`] is the diff between a fresh source scan and the
//! accumulated state of previous backups: which files need copying, which
//! files and directories have disappeared. [`execute_backup_plan`] then
//! materialises the plan under a backup's data directory and produces the
//! manifest describing what actually happened — a failed copy drops out of
//! the manifest rather than being recorded as saved.

use crate::manifest::{BackupManifest, ManifestDirectory};
use crate::scan::Directory;
use crate::sum::{BackupSum, SumDirectory};
use std::fs;
use std::io;
use std::path::Path;

/// Planned per-directory work for one backup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanDirectory {
    /// Directory name; empty for the root.
    pub name: String,
    /// Files to copy from the source into the backup.
    pub copied_files: Vec<String>,
    /// Files recorded as removed since the previous backup state.
    pub removed_files: Vec<String>,
    /// Subdirectories recorded as removed since the previous backup state.
    pub removed_directories: Vec<String>,
    /// Subdirectories with planned work of their own.
    pub subdirectories: Vec<PlanDirectory>,
    /// True if this subtree has any file to copy.
    pub contains_copied_files: bool,
    /// True if this subtree records any removal.
    pub contains_removed_items: bool,
    /// Number of summed files inside this node's removed directories.
    pub removed_directory_file_count: usize,
}

impl PlanDirectory {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// The full plan for one backup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupPlan {
    /// Root of the planned tree; name is empty.
    pub root: PlanDirectory,
}

impl BackupPlan {
    /// Diff a source snapshot against the summed previous backups.
    ///
    /// A file is planned for copying when it has no slot in the sum or when
    /// its modification time is at or after the start time of the backup
    /// that last copied it (at-or-after, so a write racing a backup is
    /// copied again rather than silently lost). Files and directories
    /// present in the sum but absent from the snapshot are recorded as
    /// removed. Directories with no work anywhere beneath them are not
    /// represented.
    #[must_use]
    pub fn new(source_tree: &Directory, backup_sum: &BackupSum<'_>) -> Self {
        Self {
            root: plan_directory(source_tree, Some(&backup_sum.root)),
        }
    }
}

/// Plan one directory level.
fn plan_directory(tree: &Directory, sum: Option<&SumDirectory<'_>>) -> PlanDirectory {
    let mut node = PlanDirectory::new(tree.name.clone());

    for file in &tree.files {
        let needs_copy = match sum.and_then(|s| s.find_file(&file.name)) {
            None => true,
            Some(slot) => file.last_modified >= slot.last_backup.start_info.start_time,
        };
        if needs_copy {
            node.copied_files.push(file.name.clone());
        }
    }

    if let Some(sum) = sum {
        for slot in &sum.files {
            if !tree.files.iter().any(|f| f.name == slot.name) {
                node.removed_files.push(slot.name.to_string());
            }
        }
        for sum_sub in &sum.subdirectories {
            if !tree.subdirectories.iter().any(|d| d.name == sum_sub.name) {
                node.removed_directories.push(sum_sub.name.to_string());
                node.removed_directory_file_count += sum_sub.file_count();
            }
        }
    }

    node.contains_copied_files = !node.copied_files.is_empty();
    node.contains_removed_items =
        !node.removed_files.is_empty() || !node.removed_directories.is_empty();

    for tree_sub in &tree.subdirectories {
        let child = plan_directory(tree_sub, sum.and_then(|s| s.find_subdirectory(&tree_sub.name)));
        if child.contains_copied_files || child.contains_removed_items {
            node.contains_copied_files |= child.contains_copied_files;
            node.contains_removed_items |= child.contains_removed_items;
            node.subdirectories.push(child);
        }
    }

    node
}

/// Failure hooks for [`execute_backup_plan`]. Default to no-ops.
pub struct ExecutePlanCallbacks<'cb> {
    /// Creating a destination directory failed; its subtree is skipped.
    pub on_mkdir_error: Box<dyn FnMut(&Path, &io::Error) + 'cb>,
    /// Copying a single file failed; the file is skipped.
    pub on_copy_error: Box<dyn FnMut(&Path, &Path, &io::Error) + 'cb>,
}

impl Default for ExecutePlanCallbacks<'_> {
    fn default() -> Self {
        Self {
            on_mkdir_error: Box::new(|_, _| {}),
            on_copy_error: Box::new(|_, _, _| {}),
        }
    }
}

/// Outcome of executing a backup plan.
#[derive(Debug, PartialEq, Eq)]
pub struct ExecutePlanResults {
    /// Manifest of what actually happened (successful copies only).
    pub manifest: BackupManifest,
    /// True if any planned path failed and was skipped.
    pub paths_skipped: bool,
    /// Number of files successfully copied.
    pub files_copied: usize,
    /// Number of removed files recorded (including those inside removed
    /// directories).
    pub files_removed: usize,
}

/// Copy a plan's files from `source` into `destination` and build the
/// resulting manifest.
///
/// `destination` is the backup's data directory and must already exist.
/// Directory creation and file copy failures are reported through
/// `callbacks`; a directory that cannot be created drops its whole planned
/// subtree. The produced manifest records only what succeeded, plus all
/// removal bookkeeping (removals involve no filesystem work, so they cannot
/// fail).
pub fn execute_backup_plan(
    plan: &BackupPlan,
    source: &Path,
    destination: &Path,
    callbacks: &mut ExecutePlanCallbacks<'_>,
) -> ExecutePlanResults {
    let mut results = ExecutePlanResults {
        manifest: BackupManifest::new(),
        paths_skipped: false,
        files_copied: 0,
        files_removed: 0,
    };

    if let Some(root) = execute_directory(&plan.root, source, destination, true, callbacks, &mut results) {
        results.manifest.root = root;
    }
    results
}

/// Execute one plan directory; `None` means the subtree was skipped or
/// produced nothing worth recording.
fn execute_directory(
    plan: &PlanDirectory,
    source_path: &Path,
    dest_path: &Path,
    is_root: bool,
    callbacks: &mut ExecutePlanCallbacks<'_>,
    results: &mut ExecutePlanResults,
) -> Option<ManifestDirectory> {
    if plan.contains_copied_files && !is_root {
        if let Err(e) = fs::create_dir(dest_path) {
            (callbacks.on_mkdir_error)(dest_path, &e);
            results.paths_skipped = true;
            return None;
        }
    }

    let mut node = ManifestDirectory::new(plan.name.clone());
    node.removed_files = plan.removed_files.clone();
    node.removed_directories = plan.removed_directories.clone();
    results.files_removed += plan.removed_files.len() + plan.removed_directory_file_count;

    for file_name in &plan.copied_files {
        let file_source = source_path.join(file_name);
        let file_dest = dest_path.join(file_name);
        match fs::copy(&file_source, &file_dest) {
            Ok(_) => {
                node.copied_files.push(file_name.clone());
                results.files_copied += 1;
            }
            Err(e) => {
                (callbacks.on_copy_error)(&file_source, &file_dest, &e);
                results.paths_skipped = true;
            }
        }
    }

    for child in &plan.subdirectories {
        let child_node = execute_directory(
            child,
            &source_path.join(&child.name),
            &dest_path.join(&child.name),
            false,
            callbacks,
            results,
        );
        if let Some(child_node) = child_node {
            node.subdirectories.push(child_node);
        }
    }

    if is_root || !node.records_nothing() {
        Some(node)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestDirectory;
    use crate::meta::BackupMetadata;
    use crate::meta::start_info::BackupStartInfo;
    use crate::scan::FileEntry;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn file(name: &str, year: i32) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            last_modified: Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    fn backup(name: &str, year: i32, root: ManifestDirectory) -> BackupMetadata {
        BackupMetadata {
            name: name.to_string(),
            start_info: BackupStartInfo {
                start_time: Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
            },
            manifest: BackupManifest { root },
        }
    }

    #[test]
    fn test_plan_everything_new_without_sum_entries() {
        let mut tree = Directory::new("");
        tree.files.push(file("a", 2020));
        let mut sub = Directory::new("sub");
        sub.files.push(file("b", 2020));
        tree.subdirectories.push(sub);
        tree.subdirectories.push(Directory::new("empty"));

        let sum = BackupSum::from_backups(&[]);
        let plan = BackupPlan::new(&tree, &sum);

        assert_eq!(plan.root.copied_files, ["a"]);
        assert!(plan.root.contains_copied_files);
        assert!(!plan.root.contains_removed_items);
        // The empty directory has no work and is not represented.
        assert_eq!(plan.root.subdirectories.len(), 1);
        assert_eq!(plan.root.subdirectories[0].copied_files, ["b"]);
    }

    #[test]
    fn test_plan_copies_only_modified_files() {
        let mut tree = Directory::new("");
        tree.files.push(file("old", 2019)); // backed up in 2020, unchanged
        tree.files.push(file("hot", 2021)); // modified after the 2020 backup
        tree.files.push(file("new", 2019)); // never backed up

        let backups = vec![backup(
            "b1",
            2020,
            ManifestDirectory {
                copied_files: vec!["old".into(), "hot".into()],
                ..ManifestDirectory::default()
            },
        )];
        let sum = BackupSum::from_backups(&backups);
        let plan = BackupPlan::new(&tree, &sum);

        assert_eq!(plan.root.copied_files, ["hot", "new"]);
    }

    #[test]
    fn test_plan_modification_at_backup_start_is_copied() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut tree = Directory::new("");
        tree.files.push(FileEntry {
            name: "raced".to_string(),
            last_modified: start,
        });

        let backups = vec![backup(
            "b1",
            2020,
            ManifestDirectory {
                copied_files: vec!["raced".into()],
                ..ManifestDirectory::default()
            },
        )];
        let sum = BackupSum::from_backups(&backups);
        let plan = BackupPlan::new(&tree, &sum);

        assert_eq!(plan.root.copied_files, ["raced"]);
    }

    #[test]
    fn test_plan_records_removals_with_file_counts() {
        let tree = Directory::new("");

        let backups = vec![backup(
            "b1",
            2020,
            ManifestDirectory {
                copied_files: vec!["gone.txt".into()],
                subdirectories: vec![ManifestDirectory {
                    name: "dir".into(),
                    copied_files: vec!["x".into(), "y".into()],
                    ..ManifestDirectory::default()
                }],
                ..ManifestDirectory::default()
            },
        )];
        let sum = BackupSum::from_backups(&backups);
        let plan = BackupPlan::new(&tree, &sum);

        assert_eq!(plan.root.removed_files, ["gone.txt"]);
        assert_eq!(plan.root.removed_directories, ["dir"]);
        assert_eq!(plan.root.removed_directory_file_count, 2);
        assert!(plan.root.contains_removed_items);
        assert!(!plan.root.contains_copied_files);
        assert!(plan.root.subdirectories.is_empty());
    }

    #[test]
    fn test_plan_keeps_deep_copy_chains() {
        let mut tree = Directory::new("");
        let mut outer = Directory::new("outer");
        let mut inner = Directory::new("inner");
        inner.files.push(file("leaf", 2020));
        outer.subdirectories.push(inner);
        tree.subdirectories.push(outer);

        let sum = BackupSum::from_backups(&[]);
        let plan = BackupPlan::new(&tree, &sum);

        let outer = &plan.root.subdirectories[0];
        assert!(outer.copied_files.is_empty());
        assert!(outer.contains_copied_files);
        let inner = &outer.subdirectories[0];
        assert_eq!(inner.copied_files, ["leaf"]);
    }

    fn plan_dir(name: &str) -> PlanDirectory {
        PlanDirectory::new(name)
    }

    #[test]
    fn test_execute_empty_plan_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("data");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&dest).unwrap();

        let results = execute_backup_plan(
            &BackupPlan::default(),
            &source,
            &dest,
            &mut ExecutePlanCallbacks::default(),
        );

        assert_eq!(results.manifest, BackupManifest::new());
        assert!(!results.paths_skipped);
        assert_eq!(results.files_copied, 0);
        assert_eq!(results.files_removed, 0);
        assert!(std::fs::read_dir(&dest).unwrap().next().is_none());
    }

    #[test]
    fn test_execute_copies_and_counts() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("data");
        std::fs::create_dir_all(source.join("sub")).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(source.join("top.txt"), "top").unwrap();
        std::fs::write(source.join("sub/deep.txt"), "deep").unwrap();

        let mut root = plan_dir("");
        root.copied_files = vec!["top.txt".into()];
        root.removed_files = vec!["bygone".into()];
        root.contains_copied_files = true;
        root.contains_removed_items = true;
        let mut sub = plan_dir("sub");
        sub.copied_files = vec!["deep.txt".into()];
        sub.contains_copied_files = true;
        root.subdirectories.push(sub);

        let results = execute_backup_plan(
            &BackupPlan { root },
            &source,
            &dest,
            &mut ExecutePlanCallbacks::default(),
        );

        assert!(!results.paths_skipped);
        assert_eq!(results.files_copied, 2);
        assert_eq!(results.files_removed, 1);
        assert_eq!(
            std::fs::read_to_string(dest.join("sub/deep.txt")).unwrap(),
            "deep"
        );
        assert_eq!(results.manifest.root.copied_files, ["top.txt"]);
        assert_eq!(results.manifest.root.removed_files, ["bygone"]);
        assert_eq!(results.manifest.root.subdirectories[0].copied_files, ["deep.txt"]);
    }

    #[test]
    fn test_execute_copy_failure_is_reported_not_recorded() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("data");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(source.join("real.txt"), "x").unwrap();

        let mut root = plan_dir("");
        root.copied_files = vec!["real.txt".into(), "phantom.txt".into()];
        root.contains_copied_files = true;

        let mut copy_errors: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut callbacks = ExecutePlanCallbacks {
            on_copy_error: Box::new(|s: &Path, d: &Path, _e: &io::Error| {
                copy_errors.push((s.to_path_buf(), d.to_path_buf()));
            }),
            ..Default::default()
        };
        let results = execute_backup_plan(&BackupPlan { root }, &source, &dest, &mut callbacks);
        drop(callbacks);

        assert!(results.paths_skipped);
        assert_eq!(results.files_copied, 1);
        assert_eq!(results.manifest.root.copied_files, ["real.txt"]);
        assert_eq!(
            copy_errors,
            [(source.join("phantom.txt"), dest.join("phantom.txt"))]
        );
    }

    #[test]
    fn test_execute_mkdir_failure_skips_subtree() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let dest = temp.path().join("data");
        std::fs::create_dir_all(source.join("blocked")).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(source.join("blocked/inner.txt"), "x").unwrap();
        // A file where the directory should go forces the mkdir to fail.
        std::fs::write(dest.join("blocked"), "in the way").unwrap();

        let mut blocked = plan_dir("blocked");
        blocked.copied_files = vec!["inner.txt".into()];
        blocked.contains_copied_files = true;
        let mut root = plan_dir("");
        root.contains_copied_files = true;
        root.subdirectories.push(blocked);

        let mut mkdir_errors = 0usize;
        let mut callbacks = ExecutePlanCallbacks {
            on_mkdir_error: Box::new(|_p: &Path, _e: &io::Error| mkdir_errors += 1),
            ..Default::default()
        };
        let results = execute_backup_plan(&BackupPlan { root }, &source, &dest, &mut callbacks);
        drop(callbacks);

        assert!(results.paths_skipped);
        assert_eq!(mkdir_errors, 1);
        assert_eq!(results.files_copied, 0);
        // The skipped subtree leaves no trace in the manifest.
        assert_eq!(results.manifest, BackupManifest::new());
    }
}
