//! The fixed ten-entry taxonomy of contextual factors.
//!
//! A contextual factor names a reason why two claims that look contradictory
//! may both hold: they were measured in different species, populations,
//! doses, and so on. Factors are persisted by their single-letter code.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// One taxonomy entry, identified by a letter code `a`..`j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
}

impl Factor {
    /// Every factor in display order.
    pub const ALL: [Self; 10] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::J,
    ];

    /// The "None of the listed factors" entry. Selecting it is what makes a
    /// free-text explanation meaningful.
    pub const OTHER: Self = Self::J;

    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::A => 'a',
            Self::B => 'b',
            Self::C => 'c',
            Self::D => 'd',
            Self::E => 'e',
            Self::F => 'f',
            Self::G => 'g',
            Self::H => 'h',
            Self::I => 'i',
            Self::J => 'j',
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::A => "Species",
            Self::B => "Population",
            Self::C => "Physiological context",
            Self::D => "Dosage or exposure duration",
            Self::E => "Route or mode of administration",
            Self::F => "Combined drug effects",
            Self::G => "Evolving scientific evidence",
            Self::H => "Known controversy or self-qualified claims",
            Self::I => "Ambiguous expression",
            Self::J => "Other",
        }
    }

    /// Guideline text shown to reviewers next to the factor.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::A => {
                "The claims are based on different species: one claim is based on an animal \
                 while the other is based on another kind of animal or on humans."
            }
            Self::B => {
                "The claims target different human subpopulations, such as differences in age, \
                 sex, genetic background, comorbidities, ethnicity, or risk profiles."
            }
            Self::C => {
                "The intervention is evaluated under different transient physiological or \
                 environmental conditions (exertion state, hypoxia, fasting status, acute \
                 stress), even within the same species and population."
            }
            Self::D => {
                "The same intervention is administered at different doses, frequencies, or \
                 durations."
            }
            Self::E => {
                "The intervention is delivered via different routes (oral, intravenous, \
                 topical, sublingual, localized)."
            }
            Self::F => {
                "The reported effect of a drug depends on its use in combination with other \
                 drugs or therapies."
            }
            Self::G => "The claims reflect different stages of scientific understanding.",
            Self::H => "One or both claims explicitly acknowledge uncertainty.",
            Self::I => "One or both claims contain grammatical errors or unclear referents.",
            Self::J => "None of the listed factors explain the contradiction.",
        }
    }

    /// Parse a space/comma/semicolon separated list of factor codes.
    ///
    /// # Errors
    ///
    /// Returns the first token that does not name a factor.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, UnknownFactor> {
        raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(str::parse)
            .collect()
    }

    const fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_lowercase() {
            'a' => Some(Self::A),
            'b' => Some(Self::B),
            'c' => Some(Self::C),
            'd' => Some(Self::D),
            'e' => Some(Self::E),
            'f' => Some(Self::F),
            'g' => Some(Self::G),
            'h' => Some(Self::H),
            'i' => Some(Self::I),
            'j' => Some(Self::J),
            _ => None,
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A factor token that matched neither a code nor a titled option.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown contextual factor '{0}' (expected a code a-j)")]
pub struct UnknownFactor(pub String);

impl FromStr for Factor {
    type Err = UnknownFactor;

    /// Accepts a bare code (`"j"`) or a full option line as older snapshots
    /// stored it (`"j. Other: None of the listed ..."`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let first = chars.next();
        let rest = chars.as_str();
        let code_shaped = rest.is_empty() || rest.starts_with('.');
        match first.filter(|_| code_shaped).and_then(Self::from_code) {
            Some(factor) => Ok(factor),
            None => Err(UnknownFactor(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_a_through_j_in_order() {
        let codes: String = Factor::ALL.iter().map(|f| f.code()).collect();
        assert_eq!(codes, "abcdefghij");
        assert_eq!(Factor::OTHER.title(), "Other");
    }

    #[test]
    fn parses_bare_codes_case_insensitively() {
        assert_eq!("a".parse::<Factor>(), Ok(Factor::A));
        assert_eq!(" J ".parse::<Factor>(), Ok(Factor::J));
    }

    #[test]
    fn parses_full_option_lines() {
        let line = "d. Dosage or exposure duration: The same intervention is administered";
        assert_eq!(line.parse::<Factor>(), Ok(Factor::D));
    }

    #[test]
    fn rejects_words_and_out_of_range_codes() {
        assert!("species".parse::<Factor>().is_err());
        assert!("k".parse::<Factor>().is_err());
        assert!("".parse::<Factor>().is_err());
    }

    #[test]
    fn parse_list_accepts_mixed_separators() {
        let parsed = Factor::parse_list("a, c;j  e").expect("valid list");
        assert_eq!(parsed, vec![Factor::A, Factor::C, Factor::J, Factor::E]);
        let err = Factor::parse_list("a,zz").unwrap_err();
        assert_eq!(err.0, "zz");
    }
}
