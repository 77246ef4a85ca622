//! Per-partition advisory locking.

use ohlcvault_types::MergeError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Returns `path` with `suffix` appended to its file name.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Retry policy for a contended partition lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockPolicy {
    /// Number of acquisition attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl LockPolicy {
    /// A policy that tries exactly once.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Sets the number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Returns the delay after failed attempt number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // base_delay * 2^attempt, capped
        let exp_delay = self.base_delay_ms.saturating_mul(1u64 << attempt.min(20));
        Duration::from_millis(exp_delay.min(self.max_delay_ms))
    }
}

/// Exclusive advisory lock on `<partition>.lock`.
///
/// Released when dropped. The lock file itself is never removed.
#[derive(Debug)]
pub struct PartitionLock {
    file: File,
    path: PathBuf,
}

impl PartitionLock {
    /// Returns the lock file path for a partition.
    #[must_use]
    pub fn lock_path(partition: &Path) -> PathBuf {
        with_suffix(partition, ".lock")
    }

    /// Tries once to take the lock without blocking.
    ///
    /// Returns `Ok(None)` if another holder has it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be opened or locked.
    pub fn try_acquire(partition: &Path) -> std::io::Result<Option<Self>> {
        let path = Self::lock_path(partition);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if !try_lock_exclusive(&file)? {
            return Ok(None);
        }
        Ok(Some(Self { file, path }))
    }

    /// Takes the lock, retrying with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::LockContention`] once every attempt has failed,
    /// or [`MergeError::Io`] if the lock file cannot be used at all.
    pub fn acquire(partition: &Path, policy: &LockPolicy) -> Result<Self, MergeError> {
        let attempts = policy.max_attempts.max(1);
        for attempt in 0..attempts {
            match Self::try_acquire(partition) {
                Ok(Some(lock)) => {
                    debug!(path = %lock.path.display(), attempt, "acquired partition lock");
                    return Ok(lock);
                }
                Ok(None) if attempt + 1 < attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        partition = %partition.display(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "partition lock held by another process, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(MergeError::Io {
                        path: Self::lock_path(partition),
                        source,
                    });
                }
            }
        }

        Err(MergeError::LockContention {
            path: partition.to_path_buf(),
            attempts,
        })
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PartitionLock {
    fn drop(&mut self) {
        unlock(&self.file);
        debug!(path = %self.path.display(), "released partition lock");
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and open for the whole call.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: as above. Closing the descriptor would also release the lock.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

// Without flock, holding the handle open is the only guard.
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
