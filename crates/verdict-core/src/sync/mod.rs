//! Pushing a reviewer's snapshot to a shared remote.
//!
//! A push is last-writer-wins: fetch the current revision marker at the
//! reviewer's path, then update with it, or create the blob when absent.
//! Nothing is ever merged and a failed push never touches local state.

pub mod directory;
pub mod github;
pub mod memory;

pub use directory::DirectoryStore;
pub use github::{GitHubStore, RepoSlug};
pub use memory::MemoryStore;

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{RemoteConfig, RemoteKind};
use crate::error::ErrorCode;
use crate::reviewer::ReviewerId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("remote rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("remote misconfigured: {0}")]
    Misconfigured(String),
}

impl SyncError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable(_) => ErrorCode::RemoteUnavailable,
            Self::Rejected { .. } => ErrorCode::RemoteRejected,
            Self::Misconfigured(_) => ErrorCode::RemoteMisconfigured,
        }
    }
}

/// Metadata of an existing remote blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBlob {
    /// Opaque marker the store needs to accept an update.
    pub revision: String,
}

/// Storage backend for reviewer snapshots.
pub trait RemoteStore {
    /// Human-readable location, for logs and status output.
    fn describe(&self) -> String;

    /// # Errors
    ///
    /// Returns [`SyncError`] if the store cannot be queried.
    fn fetch(&self, path: &str) -> Result<Option<RemoteBlob>, SyncError>;

    /// # Errors
    ///
    /// Returns [`SyncError`] if the blob cannot be created.
    fn create(&self, path: &str, content: &[u8], message: &str) -> Result<(), SyncError>;

    /// # Errors
    ///
    /// Returns [`SyncError`] if the blob cannot be replaced.
    fn update(
        &self,
        path: &str,
        content: &[u8],
        revision: &str,
        message: &str,
    ) -> Result<(), SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    Created,
    Updated,
}

/// A remote store plus the path layout reviewers share inside it.
pub struct RemoteSync {
    store: Box<dyn RemoteStore>,
    path_prefix: String,
}

impl std::fmt::Debug for RemoteSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSync")
            .field("store", &self.store.describe())
            .field("path_prefix", &self.path_prefix)
            .finish()
    }
}

impl RemoteSync {
    #[must_use]
    pub fn new(store: Box<dyn RemoteStore>, path_prefix: impl Into<String>) -> Self {
        Self {
            store,
            path_prefix: path_prefix.into(),
        }
    }

    /// Build the configured remote, or `None` for `kind = "none"`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Misconfigured`] if the selected kind is missing a
    /// required setting (repo, token, mirror directory).
    pub fn from_config(
        config: &RemoteConfig,
        project_root: &Path,
    ) -> Result<Option<Self>, SyncError> {
        let store: Box<dyn RemoteStore> = match config.kind {
            RemoteKind::None => return Ok(None),
            RemoteKind::Directory => {
                let dir = config.dir.as_ref().ok_or_else(|| {
                    SyncError::Misconfigured(
                        "remote.dir is required for kind = \"directory\"".into(),
                    )
                })?;
                Box::new(DirectoryStore::new(project_root.join(dir)))
            }
            RemoteKind::Github => Box::new(GitHubStore::from_config(config)?),
        };
        Ok(Some(Self::new(store, config.path_prefix.clone())))
    }

    #[must_use]
    pub fn describe(&self) -> String {
        self.store.describe()
    }

    /// `<path_prefix>/<reviewer>.csv`
    #[must_use]
    pub fn remote_path(&self, reviewer: &ReviewerId) -> String {
        let prefix = self.path_prefix.trim_matches('/');
        if prefix.is_empty() {
            reviewer.snapshot_file_name()
        } else {
            format!("{prefix}/{}", reviewer.snapshot_file_name())
        }
    }

    /// Upload a reviewer's whole snapshot, replacing whatever is there.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] from the underlying store.
    pub fn push(&self, reviewer: &ReviewerId, snapshot: &[u8]) -> Result<PushOutcome, SyncError> {
        let path = self.remote_path(reviewer);
        let message = format!(
            "Update annotations for {reviewer} ({})",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        );

        let outcome = match self.store.fetch(&path)? {
            Some(blob) => {
                debug!(path, revision = %blob.revision, "updating remote snapshot");
                self.store.update(&path, snapshot, &blob.revision, &message)?;
                PushOutcome::Updated
            }
            None => {
                debug!(path, "creating remote snapshot");
                self.store.create(&path, snapshot, &message)?;
                PushOutcome::Created
            }
        };
        info!(
            reviewer = %reviewer,
            remote = %self.store.describe(),
            path,
            outcome = ?outcome,
            "snapshot pushed"
        );
        Ok(outcome)
    }
}
