use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Names of the entries directly inside a directory.
pub fn dir_entries(path: &Path) -> BTreeSet<String> {
    fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

/// Relative path -> content for every file under `root`.
///
/// Used to compare a restored tree against the original source.
pub fn tree_contents(root: &Path) -> BTreeMap<String, String> {
    let mut contents = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned();
            contents.insert(relative, fs::read_to_string(entry.path()).unwrap());
        }
    }
    contents
}
