//! Operation locking to serialise runs against one backup target.
//!
//! The library itself assumes exclusive access to the backup target for the
//! duration of a run; this lock is how the `tide` binary provides that
//! guarantee. The lock is advisory, per-target, and automatically released
//! when dropped.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use fs4::fs_std::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Name of the lock file inside the backup target directory.
pub const LOCK_FILENAME: &str = ".tide.lock";

/// Holds an exclusive lock on a backup target directory.
///
/// The lock is released (and the lock file removed) when this struct is
/// dropped.
pub struct TargetLock {
    /// Lock file handle.
    lock_file: File,
    /// Path to the lock file (for error messages and cleanup).
    lock_path: PathBuf,
}

impl TargetLock {
    /// Acquire an exclusive lock on a backup target directory.
    ///
    /// The target directory is created if it does not exist yet, since a
    /// first backup locks the target before anything else does.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or another
    /// process holds the lock past the wait timeout.
    pub fn acquire(target: &Path) -> Result<Self> {
        fs::create_dir_all(target).with_context(|| {
            format!("Failed to create backup target directory {}", target.display())
        })?;
        let lock_path = target.join(LOCK_FILENAME);
        let lock_file = Self::try_acquire_lock(&lock_path)?;
        Ok(Self {
            lock_file,
            lock_path,
        })
    }

    /// Try to acquire the lock file, retrying briefly before giving up.
    fn try_acquire_lock(lock_path: &Path) -> Result<File> {
        // Shorter timeouts in test mode keep the test suite fast.
        let lock_timeout = if cfg!(test) {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(30)
        };
        let retry_interval = if cfg!(test) {
            Duration::from_millis(10)
        } else {
            Duration::from_millis(100)
        };

        let start = Instant::now();

        loop {
            let file = File::create(lock_path)
                .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

            match file.try_lock_exclusive() {
                Ok(true) => {
                    // Record who holds the lock, for stale-lock debugging.
                    use std::io::Write;
                    let mut file_ref = &file;
                    let _ = writeln!(
                        file_ref,
                        "pid={}\ntime={}",
                        std::process::id(),
                        Utc::now().to_rfc3339()
                    );
                    return Ok(file);
                }
                Ok(false) | Err(_) if start.elapsed() < lock_timeout => {
                    std::thread::sleep(retry_interval);
                }
                Ok(false) | Err(_) => {
                    bail!(
                        "Another backup or prune run is already operating on this target. \
                         Wait for it to complete or remove a stale lock at: {}",
                        lock_path.display()
                    );
                }
            }
        }
    }

    /// Release the lock explicitly (normally handled by Drop).
    ///
    /// # Errors
    ///
    /// Returns an error if the unlock operation itself fails.
    pub fn release(self) -> Result<()> {
        self.lock_file.unlock()?;
        if let Err(e) = fs::remove_file(&self.lock_path) {
            tracing::warn!(
                "failed to remove lock file {}: {e}",
                self.lock_path.display()
            );
        }
        Ok(())
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
        if let Err(e) = fs::remove_file(&self.lock_path) {
            tracing::warn!(
                "failed to remove lock file during cleanup {}: {e}",
                self.lock_path.display()
            );
        }
    }
}
