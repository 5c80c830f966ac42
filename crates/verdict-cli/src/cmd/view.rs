//! Item and record rendering shared by `show`, `traceback` and `annotate`.

use std::io::{self, Write};

use serde::Serialize;
use verdict_core::model::{Agreement, AnnotationRecord, ClaimSide, ContextualFactors, Item, Label};

use crate::output::{pretty_kv, pretty_rule, pretty_section};

/// An item together with its place in the dataset.
#[derive(Debug, Serialize)]
pub struct ItemView<'a> {
    pub position: usize,
    pub total: usize,
    pub item: &'a Item,
}

impl<'a> ItemView<'a> {
    pub const fn new(index: usize, total: usize, item: &'a Item) -> Self {
        Self {
            position: index + 1,
            total,
            item,
        }
    }
}

fn non_empty(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}

fn write_claim(w: &mut dyn Write, heading: &str, item: &Item, side: ClaimSide) -> io::Result<()> {
    let (pmid, relation) = match side {
        ClaimSide::First => (&item.pmid_1, &item.claim_1_dd_relation),
        ClaimSide::Second => (&item.pmid_2, &item.claim_2_dd_relation),
    };
    writeln!(w, "{heading} (PMID {})", non_empty(pmid))?;
    writeln!(w, "  {}", item.claim_text(side))?;
    if !relation.trim().is_empty() {
        writeln!(w, "  relation: {relation}")?;
    }
    Ok(())
}

/// Claims, metadata, and the machine's judgment for one item.
pub fn write_item_pretty(w: &mut dyn Write, view: &ItemView<'_>) -> io::Result<()> {
    let item = view.item;
    pretty_section(w, &format!("Item {} ({}/{})", item.id, view.position, view.total))?;
    pretty_kv(w, "Drug", non_empty(&item.drug))?;
    pretty_kv(w, "Disease", non_empty(&item.disease))?;
    writeln!(w)?;
    write_claim(w, "Claim 1", item, ClaimSide::First)?;
    write_claim(w, "Claim 2", item, ClaimSide::Second)?;
    writeln!(w)?;
    pretty_kv(w, "Prediction", non_empty(&item.prediction))?;
    pretty_kv(w, "Context", non_empty(&item.contextual_factor))?;
    if !item.contextual_factor_explanation.trim().is_empty() {
        pretty_kv(w, "Context why", &item.contextual_factor_explanation)?;
    }
    let reasoning = item.reasoning_text();
    if !reasoning.trim().is_empty() {
        writeln!(w)?;
        writeln!(w, "Reasoning")?;
        writeln!(w, "  {}", reasoning.trim())?;
    }
    Ok(())
}

/// `key=value` lines for one item.
pub fn write_item_text(w: &mut dyn Write, view: &ItemView<'_>) -> io::Result<()> {
    let item = view.item;
    writeln!(w, "id={}", item.id)?;
    writeln!(w, "position={}/{}", view.position, view.total)?;
    writeln!(w, "drug={}", item.drug)?;
    writeln!(w, "disease={}", item.disease)?;
    writeln!(w, "claim_1={}", item.claim_text(ClaimSide::First))?;
    writeln!(w, "claim_2={}", item.claim_text(ClaimSide::Second))?;
    writeln!(w, "prediction={}", item.prediction)?;
    writeln!(w, "contextual_factor={}", item.contextual_factor)
}

/// Human wording for the factors column.
pub fn describe_factors(factors: &ContextualFactors) -> String {
    match factors {
        ContextualFactors::Empty => "-".to_string(),
        ContextualFactors::Agree => "agree (machine factor accepted)".to_string(),
        ContextualFactors::Selected(set) => set
            .iter()
            .map(|f| format!("({}) {}", f.code(), f.title()))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// The reviewer's saved answers, or a note that there are none.
pub fn write_record_pretty(w: &mut dyn Write, record: Option<&AnnotationRecord>) -> io::Result<()> {
    pretty_rule(w)?;
    let Some(record) = record else {
        return writeln!(w, "Not annotated yet.");
    };
    pretty_kv(w, "Label", record.label.map_or("-", Label::as_str))?;
    pretty_kv(
        w,
        "Agreement",
        record.contextual_agreement.map_or("-", Agreement::as_str),
    )?;
    pretty_kv(w, "Factors", describe_factors(&record.contextual_factors))?;
    if !record.contextual_explanation.is_empty() {
        pretty_kv(w, "Explanation", &record.contextual_explanation)?;
    }
    Ok(())
}

/// `key=value` lines for one record, using the snapshot cell encodings.
pub fn write_record_text(w: &mut dyn Write, record: &AnnotationRecord) -> io::Result<()> {
    writeln!(w, "item_id={}", record.item_id)?;
    writeln!(w, "label={}", record.label.map_or("", Label::as_str))?;
    writeln!(
        w,
        "contextual_agreement={}",
        record.contextual_agreement.map_or("", Agreement::as_str)
    )?;
    writeln!(w, "contextual_factors={}", record.contextual_factors.to_cell())?;
    writeln!(w, "contextual_explanation={}", record.contextual_explanation)
}
