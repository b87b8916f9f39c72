use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("unable to open lock file: {0}")]
    Open(#[source] io::Error),

    #[error("another instance holds the lock (gave up after {0} ms)")]
    Timeout(u128),
}

/// Process-wide mutual exclusion via an advisory lock on a lock file.
/// The lock is released when the guard is dropped, so every exit path of a
/// run releases it, mid-run failures included.
pub struct RunLock {
    file: File,
}

impl RunLock {
    /// Tries to take the exclusive lock until `timeout` has elapsed. A
    /// second concurrent run must fail fast here rather than queue behind
    /// the first one.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(LockError::Open)?;

        let deadline = Instant::now() + timeout;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("acquired run lock at {}", path.display());
                    return Ok(Self { file });
                }
                Err(_) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Err(_) => return Err(LockError::Timeout(timeout.as_millis())),
            }
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
