//! Reviewer identity and the static credential check.
//!
//! A reviewer id doubles as a path component for both the local snapshot
//! and the remote blob, so it is validated once here and carried around as
//! [`ReviewerId`] afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid reviewer id '{0}'")]
    InvalidId(String),

    #[error("no reviewers are configured in [reviewers]")]
    NoReviewers,

    #[error("invalid reviewer or password for '{0}'")]
    Rejected(String),
}

impl AuthError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidId(_) => ErrorCode::InvalidReviewerId,
            Self::NoReviewers => ErrorCode::NotInitialized,
            Self::Rejected(_) => ErrorCode::AuthenticationFailed,
        }
    }
}

/// A validated reviewer id: `[A-Za-z0-9._-]+`, not starting with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ReviewerId(String);

impl ReviewerId {
    /// Validate a raw reviewer id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidId`] if the id is empty, starts with a
    /// dot, or contains anything besides ASCII letters, digits, `.`, `_`
    /// and `-`.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let valid = !raw.is_empty()
            && !raw.starts_with('.')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(AuthError::InvalidId(raw.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of this reviewer's snapshot, local and remote.
    #[must_use]
    pub fn snapshot_file_name(&self) -> String {
        format!("{}.csv", self.0)
    }
}

impl fmt::Display for ReviewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReviewerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check a reviewer/password pair against the configured table.
///
/// A successful check establishes the reviewer partition for the rest of
/// the process.
///
/// # Errors
///
/// Returns [`AuthError`] for a malformed id, an empty table, or a mismatch.
pub fn authenticate(
    table: &BTreeMap<String, String>,
    reviewer: &str,
    password: &str,
) -> Result<ReviewerId, AuthError> {
    let id = ReviewerId::parse(reviewer)?;
    if table.is_empty() {
        return Err(AuthError::NoReviewers);
    }
    match table.get(id.as_str()) {
        Some(expected) if expected == password => {
            debug!(reviewer = %id, "reviewer authenticated");
            Ok(id)
        }
        _ => {
            warn!(reviewer = %id, "authentication rejected");
            Err(AuthError::Rejected(id.0))
        }
    }
}
