//! `vd factors`: the contextual-factor taxonomy.

use std::io::Write;

use serde::Serialize;
use verdict_core::model::Factor;

use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Debug, Serialize)]
struct FactorRow {
    code: char,
    title: &'static str,
    description: &'static str,
}

fn rows() -> Vec<FactorRow> {
    Factor::ALL
        .iter()
        .map(|f| FactorRow {
            code: f.code(),
            title: f.title(),
            description: f.description(),
        })
        .collect()
}

/// Execute `vd factors`. Needs no project or credentials.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn run_factors(output: OutputMode) -> anyhow::Result<()> {
    render_mode(
        output,
        &rows(),
        |rows, w| {
            for row in rows {
                writeln!(w, "{}\t{}", row.code, row.title)?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, "Contextual factors")?;
            for row in rows {
                writeln!(w, "({}) {}", row.code, row.title)?;
                writeln!(w, "    {}", row.description)?;
            }
            writeln!(w)?;
            writeln!(w, "Select with `factors a,c,j` inside `vd annotate`.")
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_taxonomy_order() {
        let codes: String = rows().iter().map(|r| r.code).collect();
        assert_eq!(codes, "abcdefghij");
    }

    #[test]
    fn rows_serialize_with_code_and_title() {
        let json = serde_json::to_value(rows()).expect("json");
        assert_eq!(json[9]["code"], "j");
        assert!(json[0]["title"].as_str().is_some_and(|t| !t.is_empty()));
    }
}
