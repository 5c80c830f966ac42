//! `vd traceback [id]`: saved item ids in save order, plus one preview.

use std::io::Write;
use std::path::Path;

use clap::Args;
use serde::Serialize;
use verdict_core::model::AnnotationRecord;

use crate::cmd::open_workspace;
use crate::cmd::view::{write_record_pretty, write_record_text};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::reviewer::CredentialFlags;

/// Arguments for `vd traceback`.
#[derive(Args, Debug)]
pub struct TracebackArgs {
    /// Item id to preview (defaults to the first saved record).
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
struct TracebackOutput<'a> {
    reviewer: String,
    ids: Vec<&'a str>,
    preview: Option<&'a AnnotationRecord>,
}

fn select_preview<'a>(
    records: &[&'a AnnotationRecord],
    id: Option<&str>,
) -> anyhow::Result<Option<&'a AnnotationRecord>> {
    match id.map(str::trim) {
        None => Ok(records.first().copied()),
        Some(id) => records
            .iter()
            .copied()
            .find(|r| r.item_id == id)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("item '{id}' has no saved annotation")),
    }
}

/// Execute `vd traceback`.
///
/// # Errors
///
/// Returns an error if the workspace cannot be opened or the requested id
/// has no saved record.
pub fn run_traceback(
    args: &TracebackArgs,
    creds: CredentialFlags<'_>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let workspace = open_workspace(project_root, creds)?;
    let nav = &workspace.navigator;
    let records: Vec<&AnnotationRecord> = nav.records().collect();
    let preview = select_preview(&records, args.id.as_deref())?;

    let report = TracebackOutput {
        reviewer: nav.reviewer().to_string(),
        ids: records.iter().map(|r| r.item_id.as_str()).collect(),
        preview,
    };

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "ids={}", r.ids.join(","))?;
            if let Some(record) = r.preview {
                write_record_text(w, record)?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("Annotated by {} ({})", r.reviewer, r.ids.len()))?;
            if r.ids.is_empty() {
                return writeln!(w, "Nothing saved yet.");
            }
            writeln!(w, "{}", r.ids.join(", "))?;
            writeln!(w)?;
            if let Some(record) = r.preview {
                pretty_kv(w, "Preview", &record.item_id)?;
                write_record_pretty(w, Some(record))?;
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_defaults_to_first_record() {
        let a = AnnotationRecord::empty("3", "halil");
        let b = AnnotationRecord::empty("1", "halil");
        let records = vec![&a, &b];
        let preview = select_preview(&records, None).expect("preview");
        assert_eq!(preview.map(|r| r.item_id.as_str()), Some("3"));
    }

    #[test]
    fn preview_by_id() {
        let a = AnnotationRecord::empty("3", "halil");
        let b = AnnotationRecord::empty("1", "halil");
        let records = vec![&a, &b];
        let preview = select_preview(&records, Some(" 1 ")).expect("preview");
        assert_eq!(preview.map(|r| r.item_id.as_str()), Some("1"));
    }

    #[test]
    fn unknown_preview_id_is_an_error() {
        let records: Vec<&AnnotationRecord> = Vec::new();
        assert_eq!(select_preview(&records, None).expect("empty"), None);
        let err = select_preview(&records, Some("9")).unwrap_err();
        assert!(err.to_string().contains("'9'"));
    }
}
