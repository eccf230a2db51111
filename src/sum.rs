//! Accumulated state across a sequence of backups.
//!
//! A [`BackupSum`] folds the manifests of previous backups, oldest first,
//! into a single tree answering "which backup holds the latest copy of each
//! file". Copies overwrite the owning backup of a file slot, removed files
//! clear the slot, and removed directories drop whole subtrees. The backup
//! writer diffs a fresh filesystem scan against this view; restore walks it
//! to pull payloads out of the right backup.

use crate::meta::BackupMetadata;

/// One file slot in the summed view.
#[derive(Debug, Clone, Copy)]
pub struct SumFile<'a> {
    /// File name within its directory.
    pub name: &'a str,
    /// The most recent backup that copied this file.
    pub last_backup: &'a BackupMetadata,
}

/// A directory in the summed view.
#[derive(Debug, Clone, Default)]
pub struct SumDirectory<'a> {
    /// Directory name; empty for the root.
    pub name: &'a str,
    /// Files known to exist, each owned by the backup that last copied it.
    pub files: Vec<SumFile<'a>>,
    /// Subdirectories known to exist.
    pub subdirectories: Vec<SumDirectory<'a>>,
}

impl<'a> SumDirectory<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            name,
            files: Vec::new(),
            subdirectories: Vec::new(),
        }
    }

    /// Look up a file slot by name.
    #[must_use]
    pub fn find_file(&self, name: &str) -> Option<&SumFile<'a>> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Look up a subdirectory by name.
    #[must_use]
    pub fn find_subdirectory(&self, name: &str) -> Option<&SumDirectory<'a>> {
        self.subdirectories.iter().find(|d| d.name == name)
    }

    /// Total number of file slots in this subtree.
    #[must_use]
    pub fn file_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(dir) = stack.pop() {
            count += dir.files.len();
            stack.extend(dir.subdirectories.iter());
        }
        count
    }
}

/// The summed state of zero or more backups.
#[derive(Debug, Clone, Default)]
pub struct BackupSum<'a> {
    /// Root of the summed tree; name is empty.
    pub root: SumDirectory<'a>,
}

impl<'a> BackupSum<'a> {
    /// Fold a set of backups into their summed state.
    ///
    /// Backups are applied in start-time order regardless of the order of
    /// the input slice, so callers can pass [`crate::meta::read_backups`]
    /// output directly.
    #[must_use]
    pub fn from_backups(backups: &'a [BackupMetadata]) -> Self {
        let mut ordered: Vec<&BackupMetadata> = backups.iter().collect();
        ordered.sort_by_key(|b| b.start_info.start_time);

        let mut root = SumDirectory::new("");
        for backup in ordered {
            apply_manifest_directory(&mut root, &backup.manifest.root, backup);
        }
        Self { root }
    }
}

/// Fold one manifest directory node into the matching sum node.
fn apply_manifest_directory<'a>(
    sum: &mut SumDirectory<'a>,
    manifest: &'a crate::manifest::ManifestDirectory,
    backup: &'a BackupMetadata,
) {
    for name in &manifest.copied_files {
        match sum.files.iter_mut().find(|f| f.name == name.as_str()) {
            Some(slot) => slot.last_backup = backup,
            None => sum.files.push(SumFile {
                name: name.as_str(),
                last_backup: backup,
            }),
        }
    }
    for name in &manifest.removed_files {
        sum.files.retain(|f| f.name != name.as_str());
    }
    for name in &manifest.removed_directories {
        sum.subdirectories.retain(|d| d.name != name.as_str());
    }
    for manifest_sub in &manifest.subdirectories {
        let sum_sub = match sum
            .subdirectories
            .iter_mut()
            .position(|d| d.name == manifest_sub.name)
        {
            Some(index) => &mut sum.subdirectories[index],
            None => {
                sum.subdirectories.push(SumDirectory::new(&manifest_sub.name));
                sum.subdirectories.last_mut().unwrap()
            }
        };
        apply_manifest_directory(sum_sub, manifest_sub, backup);
    }
}
