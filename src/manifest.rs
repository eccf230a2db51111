//! Backup manifest model and its compact on-disk codec.
//!
//! A manifest records, per directory, which files a backup copied in and
//! which files and directories disappeared since the previous backup state.
//! On disk it is UTF-8 JSON: a single flat array of tokens written
//! depth-first. A directory token is an object carrying the directory name
//! (`n`) and only the non-empty bookkeeping lists (`cf` copied files, `rf`
//! removed files, `rd` removed directories). Moving back up the tree is
//! expressed with string tokens of the form `"^N"`, which pop N levels
//! before the next directory token attaches. This avoids repeating ancestor
//! context for every node in a deep tree.
//!
//! Example: `[{"n":""},{"n":"a","cf":["x"]},"^1",{"n":"b"}]` describes a
//! root with two subdirectories `a` (one copied file) and `b`.
//!
//! The same logical directory may legitimately appear twice in the token
//! stream (a backup writer can record copies and removals in separate
//! passes); the decoder merges such re-entrant tokens instead of
//! overwriting. Anything ambiguous or unrecognised is a hard
//! [`ManifestError::Parse`], never a guess.

use serde_json::{Map, Value, json};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Per-directory record of what one backup run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDirectory {
    /// Directory name; empty for the root.
    pub name: String,
    /// Files newly copied into the backup from this directory.
    pub copied_files: Vec<String>,
    /// Files present in a prior backup but gone now.
    pub removed_files: Vec<String>,
    /// Subdirectory names present in a prior backup but gone now.
    pub removed_directories: Vec<String>,
    /// Subdirectories with recorded activity of their own.
    pub subdirectories: Vec<ManifestDirectory>,
}

impl ManifestDirectory {
    /// Create an empty directory record.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// True if this node records no activity at all.
    #[must_use]
    pub fn records_nothing(&self) -> bool {
        self.copied_files.is_empty()
            && self.removed_files.is_empty()
            && self.removed_directories.is_empty()
            && self.subdirectories.is_empty()
    }
}

/// The complete record of one backup run: a tree rooted at the source root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupManifest {
    /// Root directory record; its name is always empty.
    pub root: ManifestDirectory,
}

impl BackupManifest {
    /// Create a manifest with an empty root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Manifest read/write failure.
///
/// I/O problems (missing file, permissions) are kept distinct from parse
/// problems so callers can tell "manifest missing" from "manifest corrupt".
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read or written.
    #[error("cannot access backup manifest: {0}")]
    Io(#[from] io::Error),
    /// The manifest file content is malformed.
    #[error("malformed backup manifest: {0}")]
    Parse(String),
}

/// Read and decode a manifest file.
///
/// # Errors
///
/// [`ManifestError::Io`] if the file cannot be read (including not-found),
/// [`ManifestError::Parse`] for any malformed content.
pub fn read_backup_manifest(path: &Path) -> Result<BackupManifest, ManifestError> {
    let text = fs::read_to_string(path)?;
    decode_manifest(&text)
}

/// Encode and write a manifest file.
///
/// # Errors
///
/// [`ManifestError::Io`] if the file cannot be written.
pub fn write_backup_manifest(path: &Path, manifest: &BackupManifest) -> Result<(), ManifestError> {
    fs::write(path, encode_manifest(manifest))?;
    Ok(())
}

/// Encode a manifest into its flat token form.
#[must_use]
pub fn encode_manifest(manifest: &BackupManifest) -> String {
    let mut tokens: Vec<Value> = Vec::new();
    // Explicit work stack; no recursion, so tree depth is not limited by
    // the call stack. `cursor` is the depth of the most recently emitted
    // directory, i.e. the top of the decoder's stack at this point.
    let mut work: Vec<(&ManifestDirectory, usize)> = vec![(&manifest.root, 0)];
    let mut cursor = 0usize;

    while let Some((node, depth)) = work.pop() {
        if !tokens.is_empty() {
            let pops = cursor + 1 - depth;
            if pops > 0 {
                tokens.push(Value::String(format!("^{pops}")));
            }
        }
        tokens.push(directory_token(node));
        cursor = depth;

        for child in node.subdirectories.iter().rev() {
            work.push((child, depth + 1));
        }
    }

    Value::Array(tokens).to_string()
}

/// Build the object token for one directory, omitting empty lists.
fn directory_token(node: &ManifestDirectory) -> Value {
    let mut object = Map::new();
    object.insert("n".to_string(), json!(node.name));
    if !node.copied_files.is_empty() {
        object.insert("cf".to_string(), json!(node.copied_files));
    }
    if !node.removed_files.is_empty() {
        object.insert("rf".to_string(), json!(node.removed_files));
    }
    if !node.removed_directories.is_empty() {
        object.insert("rd".to_string(), json!(node.removed_directories));
    }
    Value::Object(object)
}

/// Decode a manifest from its flat token form.
///
/// # Errors
///
/// [`ManifestError::Parse`] for every malformed-input case: non-array top
/// level, a bad or missing root token, unknown fields, wrongly typed
/// fields, and invalid backreferences.
pub fn decode_manifest(text: &str) -> Result<BackupManifest, ManifestError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ManifestError::Parse(e.to_string()))?;
    let Value::Array(tokens) = value else {
        return Err(ManifestError::Parse(
            "top-level value must be an array of tokens".to_string(),
        ));
    };
    let mut tokens = tokens.into_iter();

    let Some(first) = tokens.next() else {
        return Err(ManifestError::Parse(
            "manifest must start with a root directory entry".to_string(),
        ));
    };
    let root_entry = parse_directory_token(&first)?;
    if !root_entry.name.is_empty() {
        return Err(ManifestError::Parse(format!(
            "first directory entry must be the root, got name {:?}",
            root_entry.name
        )));
    }

    let mut root = ManifestDirectory::new("");
    apply_entry(&mut root, root_entry);

    // Stack of child indices leading from the root to the directory the
    // next token attaches under. Empty means the root itself is open.
    let mut stack: Vec<usize> = Vec::new();

    for token in tokens {
        match token {
            Value::String(s) => {
                let pops = parse_backreference(&s)?;
                if pops > stack.len() {
                    return Err(ManifestError::Parse(format!(
                        "backreference \"^{pops}\" pops past the root"
                    )));
                }
                stack.truncate(stack.len() - pops);
            }
            token @ Value::Object(_) => {
                let entry = parse_directory_token(&token)?;
                let parent = node_at_mut(&mut root, &stack);
                let index = match parent
                    .subdirectories
                    .iter()
                    .position(|d| d.name == entry.name)
                {
                    Some(index) => {
                        // Re-entrant token for an existing directory: merge.
                        apply_entry(&mut parent.subdirectories[index], entry);
                        index
                    }
                    None => {
                        let mut child = ManifestDirectory::new(entry.name.clone());
                        apply_entry(&mut child, entry);
                        parent.subdirectories.push(child);
                        parent.subdirectories.len() - 1
                    }
                };
                stack.push(index);
            }
            other => {
                return Err(ManifestError::Parse(format!(
                    "token must be a directory entry or backreference, got {other}"
                )));
            }
        }
    }

    Ok(BackupManifest { root })
}

/// Decoded fields of a single directory token.
struct DirectoryEntry {
    name: String,
    copied_files: Vec<String>,
    removed_files: Vec<String>,
    removed_directories: Vec<String>,
}

/// Merge a decoded token into a tree node, concatenating in encounter order.
fn apply_entry(node: &mut ManifestDirectory, entry: DirectoryEntry) {
    node.copied_files.extend(entry.copied_files);
    node.removed_files.extend(entry.removed_files);
    node.removed_directories.extend(entry.removed_directories);
}

/// Walk an index path from the root to the currently open directory.
fn node_at_mut<'a>(
    root: &'a mut ManifestDirectory,
    path: &[usize],
) -> &'a mut ManifestDirectory {
    let mut node = root;
    for &index in path {
        node = &mut node.subdirectories[index];
    }
    node
}

/// Parse a `"^N"` backreference; N must be a positive integer.
fn parse_backreference(token: &str) -> Result<usize, ManifestError> {
    let Some(count) = token.strip_prefix('^') else {
        return Err(ManifestError::Parse(format!(
            "unrecognised string token {token:?}"
        )));
    };
    let count: usize = count.parse().map_err(|_| {
        ManifestError::Parse(format!("invalid backreference count in {token:?}"))
    })?;
    if count == 0 {
        return Err(ManifestError::Parse(
            "backreference count must be at least 1".to_string(),
        ));
    }
    Ok(count)
}

/// Strictly parse a directory token: key `n` required, `cf`/`rf`/`rd`
/// optional string arrays, anything else rejected.
fn parse_directory_token(token: &Value) -> Result<DirectoryEntry, ManifestError> {
    let Value::Object(object) = token else {
        return Err(ManifestError::Parse(format!(
            "expected a directory entry object, got {token}"
        )));
    };

    let mut name: Option<String> = None;
    let mut copied_files = Vec::new();
    let mut removed_files = Vec::new();
    let mut removed_directories = Vec::new();

    for (key, value) in object {
        match key.as_str() {
            "n" => match value {
                Value::String(s) => name = Some(s.clone()),
                other => {
                    return Err(ManifestError::Parse(format!(
                        "directory name must be a string, got {other}"
                    )));
                }
            },
            "cf" => copied_files = parse_name_list(key, value)?,
            "rf" => removed_files = parse_name_list(key, value)?,
            "rd" => removed_directories = parse_name_list(key, value)?,
            other => {
                return Err(ManifestError::Parse(format!(
                    "unrecognised directory entry field {other:?}"
                )));
            }
        }
    }

    let Some(name) = name else {
        return Err(ManifestError::Parse(
            "directory entry is missing the name field".to_string(),
        ));
    };

    Ok(DirectoryEntry {
        name,
        copied_files,
        removed_files,
        removed_directories,
    })
}

/// Parse one of the `cf`/`rf`/`rd` lists; every element must be a string.
fn parse_name_list(key: &str, value: &Value) -> Result<Vec<String>, ManifestError> {
    let Value::Array(items) = value else {
        return Err(ManifestError::Parse(format!(
            "field {key:?} must be an array, got {value}"
        )));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(ManifestError::Parse(format!(
                "field {key:?} must contain only strings, got {other}"
            ))),
        })
        .collect()
}
