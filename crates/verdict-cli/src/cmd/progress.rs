//! `vd progress`: how far the reviewer is through the dataset.

use std::io::Write;
use std::path::Path;

use clap::Args;
use serde::Serialize;

use crate::cmd::open_workspace;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::reviewer::CredentialFlags;

/// Arguments for `vd progress`.
#[derive(Args, Debug, Default)]
pub struct ProgressArgs {}

#[derive(Debug, Serialize)]
struct ProgressOutput {
    reviewer: String,
    done: usize,
    total: usize,
    snapshot: String,
}

impl ProgressOutput {
    fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.done as f64 / self.total as f64;
        ratio * 100.0
    }
}

/// Execute `vd progress`.
///
/// # Errors
///
/// Returns an error if the workspace cannot be opened.
pub fn run_progress(
    _args: &ProgressArgs,
    creds: CredentialFlags<'_>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let workspace = open_workspace(project_root, creds)?;
    let nav = &workspace.navigator;
    let progress = nav.progress();
    let report = ProgressOutput {
        reviewer: nav.reviewer().to_string(),
        done: progress.done,
        total: progress.total,
        snapshot: nav.snapshot_path().display().to_string(),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "reviewer={}", r.reviewer)?;
            writeln!(w, "done={}", r.done)?;
            writeln!(w, "total={}", r.total)
        },
        |r, w| {
            pretty_section(w, &format!("Progress for {}", r.reviewer))?;
            pretty_kv(w, "Annotated", format!("{}/{} ({:.0}%)", r.done, r.total, r.percent()))?;
            pretty_kv(w, "Snapshot", &r.snapshot)
        },
    )
}
