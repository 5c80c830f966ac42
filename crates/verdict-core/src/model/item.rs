use serde::{Deserialize, Serialize};

/// One claim-pair comparison row from the dataset. Read-only.
///
/// Only `id` is required; every other column defaults to the empty string
/// so that trimmed-down dataset exports still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub id: String,
    pub claim_1: String,
    pub claim_2: String,
    pub pmid_1: String,
    pub pmid_2: String,
    pub claims_abs_1: String,
    pub claims_abs_2: String,
    pub drug: String,
    pub disease: String,
    pub claim_1_dd_relation: String,
    pub claim_2_dd_relation: String,
    pub reasoning: String,
    pub prediction: String,
    pub contextual_factor: String,
    pub contextual_factor_explanation: String,
}

impl Item {
    /// Claim text with sentence breaks restored.
    #[must_use]
    pub fn claim_text(&self, which: ClaimSide) -> String {
        match which {
            ClaimSide::First => tidy_sentence_breaks(&self.claim_1),
            ClaimSide::Second => tidy_sentence_breaks(&self.claim_2),
        }
    }

    /// Abstract text with sentence breaks restored.
    #[must_use]
    pub fn abstract_text(&self, which: ClaimSide) -> String {
        match which {
            ClaimSide::First => tidy_sentence_breaks(&self.claims_abs_1),
            ClaimSide::Second => tidy_sentence_breaks(&self.claims_abs_2),
        }
    }

    /// Machine reasoning without the `Task(n): ` prompt markers.
    #[must_use]
    pub fn reasoning_text(&self) -> String {
        self.reasoning
            .replace("Task(1): ", "")
            .replace("Task(2): ", "")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimSide {
    First,
    Second,
}

/// Insert a space after a period that runs straight into a capital letter.
///
/// Extracted claims often lose the space between sentences (`"rate.The"`).
#[must_use]
pub fn tidy_sentence_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '.' && chars.peek().is_some_and(|next| next.is_ascii_uppercase()) {
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tidy_inserts_missing_sentence_spaces() {
        assert_eq!(
            tidy_sentence_breaks("Risk fell.The effect persisted.Overall, safe."),
            "Risk fell. The effect persisted. Overall, safe."
        );
    }

    #[test]
    fn tidy_leaves_decimals_and_spaced_text_alone() {
        assert_eq!(tidy_sentence_breaks("Dose 2.5 mg. Then"), "Dose 2.5 mg. Then");
        assert_eq!(tidy_sentence_breaks("e.g. aspirin"), "e.g. aspirin");
    }

    #[test]
    fn reasoning_strips_task_markers() {
        let item = Item {
            reasoning: "Task(1): opposite effects. Task(2): dosage differs".to_string(),
            ..Item::default()
        };
        assert_eq!(item.reasoning_text(), "opposite effects. dosage differs");
    }

    #[test]
    fn claim_text_uses_requested_side() {
        let item = Item {
            claim_1: "A.B".to_string(),
            claim_2: "c".to_string(),
            ..Item::default()
        };
        assert_eq!(item.claim_text(ClaimSide::First), "A. B");
        assert_eq!(item.claim_text(ClaimSide::Second), "c");
    }
}
