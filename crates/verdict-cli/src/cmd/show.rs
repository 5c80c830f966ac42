//! `vd show <id>`: one dataset item and the reviewer's saved record.

use std::io::Write;
use std::path::Path;

use clap::Args;
use serde::Serialize;
use verdict_core::model::AnnotationRecord;
use verdict_core::navigate::NavError;

use crate::cmd::open_workspace;
use crate::cmd::view::{
    ItemView, write_item_pretty, write_item_text, write_record_pretty, write_record_text,
};
use crate::output::{OutputMode, render_mode};
use crate::reviewer::CredentialFlags;

/// Arguments for `vd show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Dataset item id.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct ShowOutput<'a> {
    #[serde(flatten)]
    view: ItemView<'a>,
    record: Option<&'a AnnotationRecord>,
}

/// Execute `vd show`.
///
/// # Errors
///
/// Returns an error if the workspace cannot be opened or the id is not in
/// the dataset.
pub fn run_show(
    args: &ShowArgs,
    creds: CredentialFlags<'_>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let workspace = open_workspace(project_root, creds)?;
    let nav = &workspace.navigator;
    let id = args.id.trim();
    let dataset = nav.dataset();
    let (index, item) = dataset
        .position(id)
        .and_then(|index| dataset.get(index).map(|item| (index, item)))
        .ok_or_else(|| NavError::UnknownItem(id.to_string()))?;

    let report = ShowOutput {
        view: ItemView::new(index, dataset.len(), item),
        record: nav.saved_record(id),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            write_item_text(w, &r.view)?;
            match r.record {
                Some(record) => write_record_text(w, record),
                None => writeln!(w, "annotated=false"),
            }
        },
        |r, w| {
            write_item_pretty(w, &r.view)?;
            write_record_pretty(w, r.record)
        },
    )
}
