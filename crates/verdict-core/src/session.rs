//! Annotation session state machine.
//!
//! [`SessionState`] is the transient, per-process view of one reviewer's
//! work: a cursor into the dataset, an edit buffer for the item under the
//! cursor, and the id of the item whose saved record the buffer was last
//! loaded from.
//!
//! Which Task 2 fields are visible and required is never stored; it is
//! derived from the buffer as a [`Phase`]:
//!
//! ```text
//! Idle ──resync──▶ Viewing ──label=incorrect──▶ Task1Incorrect
//!                     │
//!                     └──label=correct──▶ PendingTask2 ──agree──▶ Task2Agree
//!                                              │
//!                                              └──disagree──▶ Task2DisagreePendingFactors
//!                                                                 │ factors
//!                                                                 ▼
//!                                                            Task2DisagreeReady
//! ```
//!
//! Every setter re-applies the clearing rules, and [`SessionState::commit`]
//! applies them once more on the way out, so stale Task 2 values can never
//! reach a persisted record.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::error::ErrorCode;
use crate::model::taxonomy::UnknownFactor;
use crate::model::{Agreement, AnnotationRecord, ContextualFactors, Factor, Label};
use crate::reviewer::ReviewerId;

/// The first rule a buffer violates. Reported, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("select whether the machine judgment is correct")]
    MissingLabel,

    #[error("indicate agreement with the machine's contextual judgment")]
    MissingContextualAgreement,

    #[error("select at least one contextual factor")]
    MissingContextualFactors,
}

impl ValidationError {
    #[must_use]
    pub const fn code(self) -> ErrorCode {
        match self {
            Self::MissingLabel => ErrorCode::MissingLabel,
            Self::MissingContextualAgreement => ErrorCode::MissingContextualAgreement,
            Self::MissingContextualFactors => ErrorCode::MissingContextualFactors,
        }
    }
}

/// A buffer edit that the current phase does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{field} is hidden until {requires}")]
    NotEditable {
        field: &'static str,
        requires: &'static str,
    },

    #[error(transparent)]
    UnknownFactor(#[from] UnknownFactor),

    #[error("no item is loaded")]
    Idle,
}

impl SessionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Invalid(rule) => rule.code(),
            Self::NotEditable { .. } => ErrorCode::FieldNotEditable,
            Self::UnknownFactor(_) => ErrorCode::UnknownFactor,
            Self::Idle => ErrorCode::ItemNotFound,
        }
    }
}

/// Derived position in the per-item workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Viewing,
    Task1Incorrect,
    PendingTask2,
    Task2Agree,
    Task2DisagreePendingFactors,
    Task2DisagreeReady,
}

impl Phase {
    /// Whether the Task 2 question is shown.
    #[must_use]
    pub const fn task2_visible(self) -> bool {
        matches!(
            self,
            Self::PendingTask2
                | Self::Task2Agree
                | Self::Task2DisagreePendingFactors
                | Self::Task2DisagreeReady
        )
    }

    /// Whether factors and the explanation can be edited.
    #[must_use]
    pub const fn factors_editable(self) -> bool {
        matches!(
            self,
            Self::Task2DisagreePendingFactors | Self::Task2DisagreeReady
        )
    }
}

/// Working copy of one item's answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditBuffer {
    pub label: Option<Label>,
    pub contextual_agreement: Option<Agreement>,
    pub contextual_factors: BTreeSet<Factor>,
    pub contextual_explanation: String,
}

impl EditBuffer {
    /// The buffer a saved record resyncs into; `None` gives an empty buffer.
    #[must_use]
    pub fn from_record(record: Option<&AnnotationRecord>) -> Self {
        let Some(record) = record else {
            return Self::default();
        };
        Self {
            label: record.label,
            contextual_agreement: record.contextual_agreement,
            contextual_factors: record
                .contextual_factors
                .factors()
                .cloned()
                .unwrap_or_default(),
            contextual_explanation: record.contextual_explanation.clone(),
        }
    }
}

/// Cursor, edit buffer, and the id the buffer was loaded for.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    cursor: usize,
    buffer: EditBuffer,
    loaded_item_id: Option<String>,
}

impl SessionState {
    /// A fresh, idle session at position 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) const fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    #[must_use]
    pub const fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn loaded_item_id(&self) -> Option<&str> {
        self.loaded_item_id.as_deref()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.loaded_item_id.is_none() {
            return Phase::Idle;
        }
        match (self.buffer.label, self.buffer.contextual_agreement) {
            (None, _) => Phase::Viewing,
            (Some(Label::Incorrect), _) => Phase::Task1Incorrect,
            (Some(Label::Correct), None) => Phase::PendingTask2,
            (Some(Label::Correct), Some(Agreement::Agree)) => Phase::Task2Agree,
            (Some(Label::Correct), Some(Agreement::Disagree)) => {
                if self.buffer.contextual_factors.is_empty() {
                    Phase::Task2DisagreePendingFactors
                } else {
                    Phase::Task2DisagreeReady
                }
            }
        }
    }

    /// Load the saved record for `item_id` unless the buffer already belongs
    /// to that item. Returns whether the buffer was replaced.
    pub fn resync(&mut self, item_id: &str, saved: Option<&AnnotationRecord>) -> bool {
        if self.loaded_item_id.as_deref() == Some(item_id) {
            return false;
        }
        self.reload(item_id, saved);
        true
    }

    /// Unconditionally replace the buffer with `saved` (or clear it).
    pub fn reload(&mut self, item_id: &str, saved: Option<&AnnotationRecord>) {
        self.buffer = EditBuffer::from_record(saved);
        self.loaded_item_id = Some(item_id.to_string());
        debug!(item = item_id, found = saved.is_some(), phase = ?self.phase(), "buffer resynced");
    }

    /// Whether the buffer differs from what `saved` would load as.
    #[must_use]
    pub fn is_dirty(&self, saved: Option<&AnnotationRecord>) -> bool {
        self.loaded_item_id.is_some() && self.buffer != EditBuffer::from_record(saved)
    }

    /// Answer Task 1. `Incorrect` clears every Task 2 field.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Idle`] if no item is loaded.
    pub fn set_label(&mut self, label: Label) -> Result<(), SessionError> {
        self.require_item()?;
        self.buffer.label = Some(label);
        if label == Label::Incorrect {
            self.clear_task2();
        }
        debug!(label = %label, phase = ?self.phase(), "label set");
        Ok(())
    }

    /// Answer Task 2. `Agree` clears factors and explanation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotEditable`] unless the label is `correct`.
    pub fn set_contextual_agreement(&mut self, agreement: Agreement) -> Result<(), SessionError> {
        self.require_item()?;
        if !self.phase().task2_visible() {
            return Err(SessionError::NotEditable {
                field: "contextual agreement",
                requires: "the machine judgment is marked correct",
            });
        }
        self.buffer.contextual_agreement = Some(agreement);
        if agreement == Agreement::Agree {
            self.buffer.contextual_factors.clear();
            self.buffer.contextual_explanation.clear();
        }
        debug!(agreement = %agreement, phase = ?self.phase(), "contextual agreement set");
        Ok(())
    }

    /// Replace the selected factors.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotEditable`] unless Task 2 was answered
    /// `disagree`.
    pub fn set_factors(
        &mut self,
        factors: impl IntoIterator<Item = Factor>,
    ) -> Result<(), SessionError> {
        self.require_factors_editable("contextual factors")?;
        self.buffer.contextual_factors = factors.into_iter().collect();
        Ok(())
    }

    /// Replace the selected factors from a list of codes such as `"a, j"`.
    ///
    /// # Errors
    ///
    /// Same as [`SessionState::set_factors`], plus
    /// [`SessionError::UnknownFactor`] for an unrecognised code.
    pub fn set_factor_codes(&mut self, codes: &str) -> Result<(), SessionError> {
        self.require_factors_editable("contextual factors")?;
        let factors = Factor::parse_list(codes)?;
        self.set_factors(factors)
    }

    /// Set the free-text explanation for the "Other" factor.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotEditable`] unless Task 2 was answered
    /// `disagree`.
    pub fn set_explanation(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.require_factors_editable("contextual explanation")?;
        self.buffer.contextual_explanation = text.into();
        Ok(())
    }

    /// Check the buffer against the save rules. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.buffer.label {
            None => Err(ValidationError::MissingLabel),
            Some(Label::Incorrect) => Ok(()),
            Some(Label::Correct) => match self.buffer.contextual_agreement {
                None => Err(ValidationError::MissingContextualAgreement),
                Some(Agreement::Agree) => Ok(()),
                Some(Agreement::Disagree) if self.buffer.contextual_factors.is_empty() => {
                    Err(ValidationError::MissingContextualFactors)
                }
                Some(Agreement::Disagree) => Ok(()),
            },
        }
    }

    /// Produce the finalized record for the loaded item.
    ///
    /// Validation runs first. The clearing rules are then derived from the
    /// answers rather than copied from the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Idle`] if no item is loaded, or
    /// [`SessionError::Invalid`] if validation fails.
    pub fn commit(&self, reviewer: &ReviewerId) -> Result<AnnotationRecord, SessionError> {
        let item_id = self.require_item()?;
        self.validate()?;

        let mut record = AnnotationRecord::empty(item_id, reviewer.as_str());
        record.label = self.buffer.label;
        if self.buffer.label == Some(Label::Correct) {
            record.contextual_agreement = self.buffer.contextual_agreement;
            match self.buffer.contextual_agreement {
                Some(Agreement::Agree) => {
                    record.contextual_factors = ContextualFactors::Agree;
                }
                Some(Agreement::Disagree) => {
                    record.contextual_factors =
                        ContextualFactors::selected(self.buffer.contextual_factors.iter().copied());
                    if self.buffer.contextual_factors.contains(&Factor::OTHER) {
                        record.contextual_explanation =
                            self.buffer.contextual_explanation.trim().to_string();
                    } else if !self.buffer.contextual_explanation.trim().is_empty() {
                        debug!(item = item_id, "explanation dropped: \"other\" not selected");
                    }
                }
                None => {}
            }
        }
        Ok(record)
    }

    fn clear_task2(&mut self) {
        self.buffer.contextual_agreement = None;
        self.buffer.contextual_factors.clear();
        self.buffer.contextual_explanation.clear();
    }

    fn require_item(&self) -> Result<&str, SessionError> {
        self.loaded_item_id.as_deref().ok_or(SessionError::Idle)
    }

    fn require_factors_editable(&self, field: &'static str) -> Result<(), SessionError> {
        self.require_item()?;
        if self.phase().factors_editable() {
            Ok(())
        } else {
            Err(SessionError::NotEditable {
                field,
                requires: "the contextual judgment is marked disagree",
            })
        }
    }
}
