//! Cross-process lock file guarding the workbook.

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::StoreError;

/// Interval between lock attempts while another holder owns the file.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive advisory lock on a file, acquired with a timeout.
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    timeout: Duration,
}

/// Held lock. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release workbook lock: {}", e);
        }
    }
}

impl FileLock {
    /// Creates a lock bound to the given path. The file is created on first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until the lock is held or the timeout elapses.
    pub fn acquire(&self) -> Result<LockGuard, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;

        let deadline = Instant::now() + self.timeout;

        loop {
            match file.try_lock() {
                Ok(()) => return Ok(LockGuard { file }),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::LockTimeout {
                            path: self.path.clone(),
                            waited: self.timeout,
                        });
                    }
                    debug!("Workbook lock busy, retrying");
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(TryLockError::Error(e)) => return Err(e.into()),
            }
        }
    }

    /// Runs `f` while holding the lock.
    pub fn with<T>(&self, f: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self.acquire()?;
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("a.lock"), Duration::from_millis(200));

        {
            let _guard = lock.acquire().unwrap();
        }
        // Released on drop, so a second acquisition succeeds.
        let _again = lock.acquire().unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn test_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.lock");
        let holder = FileLock::new(&path, Duration::from_secs(1));
        let waiter = FileLock::new(&path, Duration::from_millis(150));

        let _guard = holder.acquire().unwrap();
        let result = waiter.acquire();
        assert!(matches!(result, Err(StoreError::LockTimeout { .. })));
    }

    #[test]
    fn test_with_returns_value() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("c.lock"), Duration::from_millis(100));
        let value = lock.with(|| Ok(7)).unwrap();
        assert_eq!(value, 7);
    }
}
