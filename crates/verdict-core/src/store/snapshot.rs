//! Local durable snapshots: one CSV file per reviewer.
//!
//! ```text
//! <snapshot dir>/
//!   halil.csv         (reviewer snapshot)
//!   halil.csv.lock    (advisory lock held while rewriting halil.csv)
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use super::{RecordStore, SnapshotError};
use crate::lock::SnapshotLock;
use crate::reviewer::ReviewerId;

/// Directory holding every reviewer's local snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
    lock_timeout: Duration,
}

impl SnapshotDir {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            lock_timeout,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reviewer-scoped snapshot path.
    #[must_use]
    pub fn path_for(&self, reviewer: &ReviewerId) -> PathBuf {
        self.root.join(reviewer.snapshot_file_name())
    }

    fn lock_path_for(&self, reviewer: &ReviewerId) -> PathBuf {
        self.root.join(format!("{}.lock", reviewer.snapshot_file_name()))
    }

    /// Raw snapshot bytes, or `None` if the reviewer has never saved.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Read`] if the file exists but cannot be read.
    pub fn read(&self, reviewer: &ReviewerId) -> Result<Option<Vec<u8>>, SnapshotError> {
        let path = self.path_for(reviewer);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SnapshotError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Load a reviewer's records. A missing snapshot is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the snapshot is unreadable or corrupt.
    pub fn load(&self, reviewer: &ReviewerId) -> Result<RecordStore, SnapshotError> {
        let path = self.path_for(reviewer);
        let Some(bytes) = self.read(reviewer)? else {
            debug!(path = %path.display(), "no snapshot yet; starting empty");
            return Ok(RecordStore::new());
        };
        let origin = path.display().to_string();
        let store = RecordStore::from_snapshot(reviewer.as_str(), &bytes, &origin)?;
        debug!(
            path = %path.display(),
            records = store.records(reviewer.as_str()).count(),
            "snapshot loaded"
        );
        Ok(store)
    }

    /// Replace a reviewer's snapshot with `bytes`.
    ///
    /// The new content is written to a sibling temp file and renamed over
    /// the snapshot while the reviewer's lock is held, so a reader never
    /// observes a half-written file.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Lock`] if another process holds the lock
    /// past the timeout, or [`SnapshotError::Write`] on I/O failure.
    pub fn write(&self, reviewer: &ReviewerId, bytes: &[u8]) -> Result<PathBuf, SnapshotError> {
        let path = self.path_for(reviewer);
        let write_err = |source: io::Error| SnapshotError::Write {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(write_err)?;
        let _lock = SnapshotLock::acquire(&self.lock_path_for(reviewer), self.lock_timeout)?;

        let tmp = self.root.join(format!(".{}.tmp", reviewer.snapshot_file_name()));
        fs::write(&tmp, bytes).map_err(write_err)?;
        fs::rename(&tmp, &path).map_err(write_err)?;

        info!(path = %path.display(), bytes = bytes.len(), "snapshot written");
        Ok(path)
    }
}
