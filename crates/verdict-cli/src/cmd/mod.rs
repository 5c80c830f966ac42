pub mod annotate;
pub mod completions;
pub mod factors;
pub mod init;
pub mod progress;
pub mod show;
pub mod sync;
pub mod traceback;
pub mod view;

use std::path::Path;

use anyhow::Context as _;
use tracing::{debug, warn};
use verdict_core::config::{self, ProjectConfig};
use verdict_core::dataset::Dataset;
use verdict_core::navigate::Navigator;
use verdict_core::reviewer;
use verdict_core::store::SnapshotDir;
use verdict_core::sync::RemoteSync;

use crate::reviewer::{CredentialFlags, resolve_credentials};

/// An authenticated reviewer's view of the project.
#[derive(Debug)]
pub struct Workspace {
    pub config: ProjectConfig,
    pub navigator: Navigator,
}

/// Load the project config, authenticate, and open the reviewer's records.
///
/// A misconfigured remote does not stop the session: saves stay local and
/// each one reports the remote error as a failed sync.
///
/// # Errors
///
/// Returns an error if the project is not initialized, the credentials are
/// missing or rejected, or the dataset or snapshot cannot be read.
pub fn open_workspace(
    project_root: &Path,
    creds: CredentialFlags<'_>,
) -> anyhow::Result<Workspace> {
    let config = config::require_project_config(project_root)?;
    let creds = resolve_credentials(creds)?;
    let reviewer = reviewer::authenticate(&config.reviewers, &creds.reviewer, &creds.password)?;

    let dataset_path = config.dataset_path(project_root);
    let dataset = Dataset::load(&dataset_path, config.dataset.limit)
        .with_context(|| format!("loading dataset {}", dataset_path.display()))?;
    debug!(items = dataset.len(), path = %dataset_path.display(), "dataset loaded");

    let snapshots = SnapshotDir::new(
        config.snapshot_dir(project_root),
        config.snapshots.lock_timeout(),
    );

    let remote = RemoteSync::from_config(&config.remote, project_root);
    if let Err(err) = &remote {
        warn!(error = %err, "remote unusable, saves stay local");
    }

    let navigator = Navigator::open(dataset, reviewer, snapshots, remote, config.session.jump)?;
    Ok(Workspace { config, navigator })
}
