use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::{fmt, str::FromStr};

use super::taxonomy::{Factor, UnknownFactor};

/// Task 1 answer: is the machine's contradiction judgment right?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// The reviewer agrees there is a contradiction. Task 2 follows.
    Correct,
    /// The reviewer finds no contradiction. Terminal for the item.
    Incorrect,
}

impl Label {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
        }
    }
}

/// Task 2 answer: does the reviewer accept the machine's contextual judgment?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agreement {
    Agree,
    Disagree,
}

impl Agreement {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agree => "agree",
            Self::Disagree => "disagree",
        }
    }
}

/// Error for a cell that does not hold one of the expected enum values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} value '{value}'")]
pub struct InvalidValue {
    pub field: &'static str,
    pub value: String,
}

impl FromStr for Label {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "correct" | "c" => Ok(Self::Correct),
            "incorrect" | "i" => Ok(Self::Incorrect),
            _ => Err(InvalidValue {
                field: "label",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Agreement {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agree" => Ok(Self::Agree),
            "disagree" => Ok(Self::Disagree),
            _ => Err(InvalidValue {
                field: "contextual_agreement",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted shape of the `contextual_factors` column.
///
/// `Selected` never holds an empty set; use [`ContextualFactors::selected`]
/// to build it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "factors", rename_all = "lowercase")]
pub enum ContextualFactors {
    #[default]
    Empty,
    /// Sentinel written when the reviewer agrees with the machine's factor.
    Agree,
    Selected(BTreeSet<Factor>),
}

/// Cell text of the agree sentinel.
pub const AGREE_SENTINEL: &str = "agree";

/// Separator between factor codes inside one cell.
pub const FACTOR_SEPARATOR: &str = "; ";

impl ContextualFactors {
    #[must_use]
    pub fn selected(factors: impl IntoIterator<Item = Factor>) -> Self {
        let set: BTreeSet<Factor> = factors.into_iter().collect();
        if set.is_empty() {
            Self::Empty
        } else {
            Self::Selected(set)
        }
    }

    #[must_use]
    pub fn factors(&self) -> Option<&BTreeSet<Factor>> {
        match self {
            Self::Selected(set) => Some(set),
            Self::Empty | Self::Agree => None,
        }
    }

    #[must_use]
    pub fn contains(&self, factor: Factor) -> bool {
        self.factors().is_some_and(|set| set.contains(&factor))
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Encode for a snapshot cell: `""`, `"agree"`, or `"a; j"`.
    #[must_use]
    pub fn to_cell(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Agree => AGREE_SENTINEL.to_string(),
            Self::Selected(set) => set
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(FACTOR_SEPARATOR),
        }
    }

    /// Decode a snapshot cell. Entries are separated by `;` and may be bare
    /// codes or full option lines.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownFactor`] for an entry that names no factor.
    pub fn from_cell(cell: &str) -> Result<Self, UnknownFactor> {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Ok(Self::Empty);
        }
        if trimmed.eq_ignore_ascii_case(AGREE_SENTINEL) {
            return Ok(Self::Agree);
        }
        let factors = trimmed
            .split(';')
            .filter(|entry| !entry.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Factor>, _>>()?;
        Ok(Self::selected(factors))
    }
}

/// The single persisted unit per (item, reviewer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub item_id: String,
    pub reviewer_id: String,
    pub label: Option<Label>,
    pub contextual_agreement: Option<Agreement>,
    pub contextual_factors: ContextualFactors,
    pub contextual_explanation: String,
}

impl AnnotationRecord {
    /// A record with only the key set.
    #[must_use]
    pub fn empty(item_id: impl Into<String>, reviewer_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            reviewer_id: reviewer_id.into(),
            label: None,
            contextual_agreement: None,
            contextual_factors: ContextualFactors::Empty,
            contextual_explanation: String::new(),
        }
    }

    /// Upsert key.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (&self.item_id, &self.reviewer_id)
    }

    /// Whether the Task 2 columns obey the clearing rules.
    ///
    /// Records produced by a commit always do; records read from old
    /// snapshots may not.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let explanation_ok = self.contextual_explanation.is_empty()
            || self.contextual_factors.contains(Factor::OTHER);
        match (self.label, self.contextual_agreement) {
            (Some(Label::Correct), Some(Agreement::Agree)) => {
                self.contextual_factors == ContextualFactors::Agree
                    && self.contextual_explanation.is_empty()
            }
            (Some(Label::Correct), Some(Agreement::Disagree)) => {
                self.contextual_factors.factors().is_some() && explanation_ok
            }
            (Some(Label::Correct), None) | (None, None) => {
                self.contextual_factors.is_empty() && self.contextual_explanation.is_empty()
            }
            (Some(Label::Incorrect), agreement) => {
                agreement.is_none()
                    && self.contextual_factors.is_empty()
                    && self.contextual_explanation.is_empty()
            }
            (None, Some(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_and_agreement_parse_case_insensitively() {
        assert_eq!("Correct".parse::<Label>(), Ok(Label::Correct));
        assert_eq!("incorrect".parse::<Label>(), Ok(Label::Incorrect));
        assert_eq!("Agree".parse::<Agreement>(), Ok(Agreement::Agree));
        assert_eq!("DISAGREE".parse::<Agreement>(), Ok(Agreement::Disagree));
        assert!("maybe".parse::<Label>().is_err());
    }

    #[test]
    fn factors_cell_encodes_sorted_codes() {
        let cell = ContextualFactors::selected([Factor::J, Factor::A]);
        assert_eq!(cell.to_cell(), "a; j");
        assert_eq!(ContextualFactors::Agree.to_cell(), "agree");
        assert_eq!(ContextualFactors::Empty.to_cell(), "");
    }

    #[test]
    fn selected_with_no_factors_is_empty() {
        assert_eq!(ContextualFactors::selected([]), ContextualFactors::Empty);
    }

    #[test]
    fn factors_cell_accepts_legacy_forms() {
        assert_eq!(
            ContextualFactors::from_cell("Agree"),
            Ok(ContextualFactors::Agree)
        );
        let legacy = "a. Species: The claims are based on different species; j. Other: None";
        assert_eq!(
            ContextualFactors::from_cell(legacy),
            Ok(ContextualFactors::selected([Factor::A, Factor::J]))
        );
        assert_eq!(ContextualFactors::from_cell("  "), Ok(ContextualFactors::Empty));
        assert!(ContextualFactors::from_cell("a; bogus").is_err());
    }

    #[test]
    fn consistency_flags_stale_task2_data() {
        let mut record = AnnotationRecord::empty("3", "halil");
        record.label = Some(Label::Incorrect);
        assert!(record.is_consistent());

        record.contextual_factors = ContextualFactors::selected([Factor::B]);
        assert!(!record.is_consistent());

        record.label = Some(Label::Correct);
        record.contextual_agreement = Some(Agreement::Disagree);
        record.contextual_explanation = "needs other".to_string();
        assert!(!record.is_consistent());

        record.contextual_factors = ContextualFactors::selected([Factor::B, Factor::J]);
        assert!(record.is_consistent());
    }
}
