//! Backup start information, written when a backup directory is initialised.

use super::InfoError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Metadata recorded at the moment a backup begins.
///
/// The start time doubles as the reference point for change detection: a
/// source file is considered modified if its mtime is at or after the start
/// time of the backup that last copied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupStartInfo {
    /// UTC time at which the backup run began.
    pub start_time: DateTime<Utc>,
}

impl BackupStartInfo {
    /// Start info stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            start_time: Utc::now(),
        }
    }
}

/// Read a start info file.
///
/// # Errors
///
/// [`InfoError::Io`] if the file cannot be read, [`InfoError::Parse`] if it
/// is not valid start info JSON.
pub fn read_backup_start_info(path: &Path) -> Result<BackupStartInfo, InfoError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write a start info file as pretty-printed JSON.
///
/// # Errors
///
/// [`InfoError::Io`] if the file cannot be written.
pub fn write_backup_start_info(path: &Path, info: &BackupStartInfo) -> Result<(), InfoError> {
    let text = serde_json::to_string_pretty(info).map_err(InfoError::Parse)?;
    fs::write(path, text)?;
    Ok(())
}
