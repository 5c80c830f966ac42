use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{RemoteBlob, RemoteStore, SyncError};

/// Mirror directory on a shared filesystem. The revision marker is the
/// BLAKE3 digest of the current content.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, SyncError> {
        if path
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(SyncError::Misconfigured(format!("unsafe remote path '{path}'")));
        }
        Ok(self.root.join(path))
    }

    fn write(target: &Path, content: &[u8]) -> Result<(), SyncError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }
        fs::write(target, content).map_err(unavailable)?;
        debug!(path = %target.display(), bytes = content.len(), "mirror written");
        Ok(())
    }
}

fn revision_of(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn unavailable(err: io::Error) -> SyncError {
    SyncError::Unavailable(err.to_string())
}

impl RemoteStore for DirectoryStore {
    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }

    fn fetch(&self, path: &str) -> Result<Option<RemoteBlob>, SyncError> {
        let target = self.resolve(path)?;
        match fs::read(&target) {
            Ok(bytes) => Ok(Some(RemoteBlob {
                revision: revision_of(&bytes),
            })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(unavailable(err)),
        }
    }

    fn create(&self, path: &str, content: &[u8], _message: &str) -> Result<(), SyncError> {
        let target = self.resolve(path)?;
        if target.exists() {
            return Err(SyncError::Rejected {
                status: 422,
                message: format!("{path} already exists"),
            });
        }
        Self::write(&target, content)
    }

    fn update(
        &self,
        path: &str,
        content: &[u8],
        revision: &str,
        _message: &str,
    ) -> Result<(), SyncError> {
        let target = self.resolve(path)?;
        let current = match fs::read(&target) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SyncError::Rejected {
                    status: 404,
                    message: format!("{path} does not exist"),
                });
            }
            Err(err) => return Err(unavailable(err)),
        };
        if revision_of(&current) != revision {
            return Err(SyncError::Rejected {
                status: 409,
                message: format!("{path} changed since revision {revision}"),
            });
        }
        Self::write(&target, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fetch_reports_content_digest() {
        let dir = TempDir::new().expect("tempdir");
        let store = DirectoryStore::new(dir.path());
        assert_eq!(store.fetch("annotations/halil.csv"), Ok(None));

        store
            .create("annotations/halil.csv", b"id\n1\n", "m")
            .expect("create");
        let blob = store.fetch("annotations/halil.csv").expect("fetch").expect("exists");
        assert_eq!(blob.revision, blake3::hash(b"id\n1\n").to_hex().to_string());
        assert_eq!(
            fs::read(dir.path().join("annotations/halil.csv")).expect("read"),
            b"id\n1\n"
        );
    }

    #[test]
    fn update_with_stale_revision_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let store = DirectoryStore::new(dir.path());
        store.create("a.csv", b"one", "m").expect("create");
        let stale = store.fetch("a.csv").expect("fetch").expect("exists").revision;
        store.update("a.csv", b"two", &stale, "m").expect("update");

        let err = store.update("a.csv", b"three", &stale, "m").unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: 409, .. }));
    }

    #[test]
    fn traversal_paths_are_refused() {
        let dir = TempDir::new().expect("tempdir");
        let store = DirectoryStore::new(dir.path());
        assert!(matches!(
            store.fetch("../escape.csv"),
            Err(SyncError::Misconfigured(_))
        ));
    }
}
