//! Named cross-process locks backed by files in the lock directory
//!
//! Each repository full name maps to one lock file. Locks are exclusive
//! advisory locks on an open file handle, so they contend across tasks,
//! threads and processes that share the directory. A lock is released when
//! its [`LockGuard`] is dropped.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::config::Config;
use crate::{Error, Result};

/// Delay between attempts while a lock is held elsewhere
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Hands out named locks under a single directory
#[derive(Debug, Clone)]
pub struct LockManager {
    dir: PathBuf,
    timeout: Duration,
}

impl LockManager {
    /// Create a manager for `dir` that gives up after `timeout`
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    /// Manager for the configured lock directory and timeout
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.lock_dir(), config.lock_timeout)
    }

    /// The lock directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the lock directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(Error::Io)
    }

    /// Path of the lock file for `name`
    ///
    /// Names are form-encoded so `owner/name` stays a single file name.
    pub fn lock_path(&self, name: &str) -> PathBuf {
        let file_name: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
        self.dir.join(file_name)
    }

    /// Wait for the named lock and take it
    ///
    /// Returns [`Error::LockTimeout`] if the lock is still held elsewhere
    /// once the configured timeout has elapsed.
    pub async fn acquire(&self, name: &str) -> Result<LockGuard> {
        let path = self.lock_path(name);
        let file = open_lock_file(&path)?;
        let start = Instant::now();
        let mut contended = false;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(lock = %name, waited = ?start.elapsed(), "Acquired lock");
                    return Ok(LockGuard {
                        name: name.to_string(),
                        file,
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if !contended {
                        debug!(lock = %name, "Lock is held elsewhere, waiting");
                        contended = true;
                    }
                }
                Err(e) => return Err(Error::Io(e)),
            }

            let waited = start.elapsed();
            if waited >= self.timeout {
                warn!(lock = %name, ?waited, "Gave up waiting for lock");
                return Err(Error::LockTimeout {
                    name: name.to_string(),
                    waited,
                });
            }

            tokio::time::sleep(POLL_INTERVAL.min(self.timeout - waited)).await;
        }
    }

    /// Take the named lock only if it is free right now
    pub fn try_acquire(&self, name: &str) -> Result<Option<LockGuard>> {
        let file = open_lock_file(&self.lock_path(name))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(LockGuard {
                name: name.to_string(),
                file,
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| Error::Other(format!("Failed to open lock {}: {}", path.display(), e)))
}

/// Exclusive hold on a named lock, released on drop
#[derive(Debug)]
pub struct LockGuard {
    name: String,
    file: File,
}

impl LockGuard {
    /// Name the lock was taken under
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.name, error = %e, "Failed to unlock, closing handle instead");
        } else {
            debug!(lock = %self.name, "Released lock");
        }
    }
}
