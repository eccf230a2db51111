//! Backup completion information, written as the final step of a backup.
//!
//! The presence of this file distinguishes a finished backup from one that
//! was interrupted partway.

use super::InfoError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Metadata recorded when a backup run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupCompleteInfo {
    /// UTC time at which the backup run ended.
    pub end_time: DateTime<Utc>,
    /// True if any source path was skipped due to filesystem errors.
    pub paths_skipped: bool,
}

/// Read a completion info file.
///
/// # Errors
///
/// [`InfoError::Io`] if the file cannot be read, [`InfoError::Parse`] if it
/// is not valid completion info JSON.
pub fn read_backup_complete_info(path: &Path) -> Result<BackupCompleteInfo, InfoError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write a completion info file as pretty-printed JSON.
///
/// # Errors
///
/// [`InfoError::Io`] if the file cannot be written.
pub fn write_backup_complete_info(path: &Path, info: &BackupCompleteInfo) -> Result<(), InfoError> {
    let text = serde_json::to_string_pretty(info).map_err(InfoError::Parse)?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("completion.json");
        let info = BackupCompleteInfo {
            end_time: Utc.with_ymd_and_hms(2021, 6, 3, 12, 35, 0).unwrap(),
            paths_skipped: true,
        };

        write_backup_complete_info(&path, &info).unwrap();
        assert_eq!(read_backup_complete_info(&path).unwrap(), info);
    }

    #[test]
    fn test_malformed_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("completion.json");
        std::fs::write(&path, r#"{"end_time": "2020-01-01T00:00:00+00:00"}"#).unwrap();
        assert!(matches!(
            read_backup_complete_info(&path),
            Err(InfoError::Parse(_))
        ));
    }
}
