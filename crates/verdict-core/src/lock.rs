//! Per-reviewer advisory lock around snapshot rewrites.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::ErrorCode;

const FIRST_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub enum LockError {
    /// Another process still held the lock when the wait ran out.
    Contended { path: PathBuf, waited: Duration },
    /// The lock file could not be created or opened.
    Io { path: PathBuf, source: io::Error },
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Contended { .. } => ErrorCode::LockContention,
            Self::Io { .. } => ErrorCode::SnapshotWriteFailed,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Contended { path, .. } | Self::Io { path, .. } => path,
        }
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contended { path, waited } => write!(
                f,
                "snapshot lock {} still held after {}ms",
                path.display(),
                waited.as_millis()
            ),
            Self::Io { path, source } => {
                write!(f, "cannot open snapshot lock {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Contended { .. } => None,
        }
    }
}

/// Held while one reviewer's snapshot is rewritten; released on drop.
///
/// Different reviewers lock different files and never contend.
#[derive(Debug)]
pub struct SnapshotLock {
    file: File,
    path: PathBuf,
}

impl SnapshotLock {
    /// Take the exclusive lock at `path`, retrying with backoff for up to
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// [`LockError::Contended`] when the wait runs out, [`LockError::Io`]
    /// when the lock file cannot be opened.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(io_err)?;

        let started = Instant::now();
        let mut backoff = FIRST_BACKOFF;
        while file.try_lock_exclusive().is_err() {
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(LockError::Contended {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(backoff.min(timeout - waited));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[test]
    fn reacquire_after_drop() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested/halil.csv.lock");
        let lock = SnapshotLock::acquire(&path, Duration::from_millis(50)).expect("lock");
        assert_eq!(lock.path(), path);
        drop(lock);
        SnapshotLock::acquire(&path, Duration::from_millis(50)).expect("relock");
    }

    #[test]
    fn held_lock_reports_contention() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("halil.csv.lock");
        let _held = SnapshotLock::acquire(&path, Duration::from_millis(50)).expect("lock");

        let err = SnapshotLock::acquire(&path, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(
            err,
            LockError::Contended { waited, .. } if waited >= Duration::from_millis(20)
        ));
        assert_eq!(err.code(), ErrorCode::LockContention);
        assert_eq!(err.path(), path);
        assert!(err.to_string().contains("still held"));
    }

    #[test]
    fn separate_reviewers_lock_independently() {
        let dir = TempDir::new().expect("tempdir");
        let wait = Duration::from_millis(20);
        let _a = SnapshotLock::acquire(&dir.path().join("a.lock"), wait).expect("a");
        let _b = SnapshotLock::acquire(&dir.path().join("b.lock"), wait).expect("b");
    }

    #[test]
    fn waiter_gets_the_lock_once_released() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("halil.csv.lock");
        let held = SnapshotLock::acquire(&path, Duration::from_millis(50)).expect("lock");

        let (ready_tx, ready_rx) = mpsc::channel();
        let waiter_path = path.clone();
        let waiter = std::thread::spawn(move || {
            ready_tx.send(()).expect("signal");
            SnapshotLock::acquire(&waiter_path, Duration::from_secs(5)).map(|_| ())
        });
        ready_rx.recv().expect("waiter started");
        std::thread::sleep(Duration::from_millis(30));
        drop(held);

        waiter.join().expect("join").expect("waiter acquires");
    }

    #[test]
    fn unopenable_path_is_an_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").expect("write");
        let err =
            SnapshotLock::acquire(&blocker.join("x.lock"), Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, LockError::Io { .. }));
        assert_eq!(err.code(), ErrorCode::SnapshotWriteFailed);
    }
}
