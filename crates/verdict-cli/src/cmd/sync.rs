//! `vd sync`: push the reviewer's local snapshot to the configured remote.
//!
//! Saves during `vd annotate` already push; this is the retry path after a
//! push failed, and it reports the failure with a nonzero exit.

use std::io::Write;
use std::path::Path;

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use verdict_core::navigate::SyncStatus;

use crate::cmd::open_workspace;
use crate::output::{OutputMode, pretty_kv, render_mode};
use crate::reviewer::CredentialFlags;

#[derive(Args, Debug, Default)]
pub struct SyncArgs {}

#[derive(Debug, Serialize)]
struct SyncReport {
    reviewer: String,
    remote: Option<String>,
    #[serde(flatten)]
    status: SyncStatus,
}

pub(crate) fn status_line(status: &SyncStatus) -> String {
    match status {
        SyncStatus::Created { path } => format!("created {path}"),
        SyncStatus::Updated { path } => format!("updated {path}"),
        SyncStatus::Skipped => "skipped (no remote configured)".to_string(),
        SyncStatus::Failed { code, message } => format!("failed [{code}]: {message}"),
    }
}

/// Execute `vd sync`.
///
/// # Errors
///
/// Returns an error if the workspace cannot be opened, the remote is
/// misconfigured, or the push fails.
pub fn run_sync(
    _args: &SyncArgs,
    creds: CredentialFlags<'_>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let workspace = open_workspace(project_root, creds)?;
    let nav = &workspace.navigator;
    if let Some(err) = nav.remote_error() {
        return Err(err.clone()).context("remote is not usable");
    }
    let status = nav.push_snapshot()?;

    let report = SyncReport {
        reviewer: nav.reviewer().to_string(),
        remote: nav.remote().map(verdict_core::sync::RemoteSync::describe),
        status,
    };

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "reviewer={}", r.reviewer)?;
            writeln!(w, "remote={}", r.remote.as_deref().unwrap_or(""))?;
            writeln!(w, "status={}", status_line(&r.status))
        },
        |r, w| {
            pretty_kv(w, "Reviewer", &r.reviewer)?;
            pretty_kv(w, "Remote", r.remote.as_deref().unwrap_or("none"))?;
            pretty_kv(w, "Sync", status_line(&r.status))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines_name_the_outcome() {
        assert_eq!(
            status_line(&SyncStatus::Created {
                path: "annotations/halil.csv".into()
            }),
            "created annotations/halil.csv"
        );
        assert!(status_line(&SyncStatus::Skipped).starts_with("skipped"));
        assert_eq!(
            status_line(&SyncStatus::Failed {
                code: "E5001".into(),
                message: "offline".into()
            }),
            "failed [E5001]: offline"
        );
    }

    #[test]
    fn report_flattens_status_tag() {
        let report = SyncReport {
            reviewer: "halil".into(),
            remote: None,
            status: SyncStatus::Skipped,
        };
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reviewer"], "halil");
    }
}
