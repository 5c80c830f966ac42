use std::fmt;

/// Machine-readable error codes shared by every verdict error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    AuthenticationFailed,
    InvalidReviewerId,
    DatasetUnreadable,
    DuplicateItemId,
    ItemNotFound,
    MissingLabel,
    MissingContextualAgreement,
    MissingContextualFactors,
    FieldNotEditable,
    UnknownFactor,
    SnapshotCorrupt,
    SnapshotWriteFailed,
    LockContention,
    RemoteUnavailable,
    RemoteRejected,
    RemoteMisconfigured,
}

impl ErrorCode {
    /// The `E####` string printed in `error[...]` and JSON `error_code`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::AuthenticationFailed => "E1101",
            Self::InvalidReviewerId => "E1102",
            Self::DatasetUnreadable => "E2001",
            Self::DuplicateItemId => "E2002",
            Self::ItemNotFound => "E2003",
            Self::MissingLabel => "E3001",
            Self::MissingContextualAgreement => "E3002",
            Self::MissingContextualFactors => "E3003",
            Self::FieldNotEditable => "E3101",
            Self::UnknownFactor => "E3102",
            Self::SnapshotCorrupt => "E4001",
            Self::SnapshotWriteFailed => "E4002",
            Self::LockContention => "E4003",
            Self::RemoteUnavailable => "E5001",
            Self::RemoteRejected => "E5002",
            Self::RemoteMisconfigured => "E5003",
        }
    }

    /// One-phrase description of the failure class.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::AuthenticationFailed => "Invalid reviewer or password",
            Self::InvalidReviewerId => "Reviewer id is not a safe path component",
            Self::DatasetUnreadable => "Dataset unreadable",
            Self::DuplicateItemId => "Duplicate item id in dataset",
            Self::ItemNotFound => "Item not found",
            Self::MissingLabel => "Task 1 answer missing",
            Self::MissingContextualAgreement => "Task 2 agreement missing",
            Self::MissingContextualFactors => "No contextual factor selected",
            Self::FieldNotEditable => "Field is hidden for the current answer",
            Self::UnknownFactor => "Unknown taxonomy factor",
            Self::SnapshotCorrupt => "Annotation snapshot unreadable",
            Self::SnapshotWriteFailed => "Annotation snapshot write failed",
            Self::LockContention => "Lock contention",
            Self::RemoteUnavailable => "Remote store unreachable",
            Self::RemoteRejected => "Remote store rejected the push",
            Self::RemoteMisconfigured => "Remote store misconfigured",
        }
    }

    /// Optional remediation hint that can be surfaced to reviewers and scripts.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `vd init` to create .verdict/config.toml."),
            Self::ConfigParseError => Some("Fix syntax in .verdict/config.toml and retry."),
            Self::AuthenticationFailed => {
                Some("Check --reviewer/--password or VERDICT_REVIEWER/VERDICT_PASSWORD.")
            }
            Self::InvalidReviewerId => Some("Use letters, digits, `.`, `_` or `-` only."),
            Self::DatasetUnreadable => Some("Check [dataset] path in .verdict/config.toml."),
            Self::DuplicateItemId => Some("Every dataset row needs a unique `id`."),
            Self::ItemNotFound => Some("Use `vd traceback` to list annotated ids."),
            Self::MissingLabel => Some("Answer whether the machine judgment is correct."),
            Self::MissingContextualAgreement => {
                Some("Indicate agreement with the machine's contextual judgment.")
            }
            Self::MissingContextualFactors => Some("Select at least one contextual factor."),
            Self::FieldNotEditable => Some("Answer `disagree` on Task 2 before editing factors."),
            Self::UnknownFactor => Some("Use factor codes a-j (see `vd factors`)."),
            Self::SnapshotCorrupt => Some("Restore the snapshot from the remote copy or a backup."),
            Self::SnapshotWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Another verdict process is saving for this reviewer."),
            Self::RemoteUnavailable => Some("Local work is saved. Retry with `vd sync`."),
            Self::RemoteRejected => Some("Check the remote token and repository permissions."),
            Self::RemoteMisconfigured => Some("Fix the [remote] section in .verdict/config.toml."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
