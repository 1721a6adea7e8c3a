use std::fmt;

use crate::model::validate::ValidationError;
use crate::store::StoreError;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotAuthenticated,
    ConfigParseError,
    InvalidPreference,
    InvalidRecord,
    InvalidIdentifier,
    RecordConflict,
    StoreTransport,
    SerializationFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`P####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "P1001",
            Self::ConfigParseError => "P1002",
            Self::InvalidPreference => "P2001",
            Self::InvalidRecord => "P2002",
            Self::InvalidIdentifier => "P2003",
            Self::RecordConflict => "P3001",
            Self::StoreTransport => "P5001",
            Self::SerializationFailed => "P5002",
            Self::InternalUnexpected => "P9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "No authenticated session",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidPreference => "Preference item failed validation",
            Self::InvalidRecord => "Record failed validation",
            Self::InvalidIdentifier => "Malformed identifier",
            Self::RecordConflict => "Conditional record write kept losing the race",
            Self::StoreTransport => "Store transport failure",
            Self::SerializationFailed => "Serialization failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotAuthenticated => Some("Attach a session before issuing record writes."),
            Self::ConfigParseError => Some("Fix syntax in prefsync/config.toml and retry."),
            Self::InvalidPreference | Self::InvalidRecord => {
                Some("Correct the rejected field; nothing was written.")
            }
            Self::InvalidIdentifier => Some("Use a well-formed DID, AT-URI, or TID."),
            Self::RecordConflict => {
                Some("Another writer is updating the same record; retry later.")
            }
            Self::StoreTransport => None,
            Self::SerializationFailed => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by preference and record operations.
#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    /// The operation needs an owner identity and none is attached.
    #[error("{}: operation requires an authenticated session", ErrorCode::NotAuthenticated.code())]
    NotAuthenticated,

    /// A constructed item or record failed its shape check.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The record CAS loop exhausted its retry bound.
    #[error(
        "{}: conditional write lost to a concurrent writer on all {attempts} attempts",
        ErrorCode::RecordConflict.code()
    )]
    Conflict { attempts: u32 },

    /// Opaque failure from a store collaborator, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{}: {0}", ErrorCode::SerializationFailed.code())]
    Serialization(#[from] serde_json::Error),
}

impl PrefsError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotAuthenticated => ErrorCode::NotAuthenticated,
            Self::Validation(err) => err.code(),
            Self::Conflict { .. } => ErrorCode::RecordConflict,
            Self::Store(StoreError::Conflict { .. }) => ErrorCode::RecordConflict,
            Self::Store(StoreError::Transport(_)) => ErrorCode::StoreTransport,
            Self::Serialization(_) => ErrorCode::SerializationFailed,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, PrefsError};
    use crate::model::validate::ValidationError;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotAuthenticated,
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidPreference,
            ErrorCode::InvalidRecord,
            ErrorCode::InvalidIdentifier,
            ErrorCode::RecordConflict,
            ErrorCode::StoreTransport,
            ErrorCode::SerializationFailed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::RecordConflict.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('P'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn validation_errors_keep_their_code() {
        let err = PrefsError::from(ValidationError::record("displayName", "too long"));
        assert_eq!(err.code(), ErrorCode::InvalidRecord);
        assert!(err.hint().is_some());
        assert!(err.to_string().contains("displayName"));
    }

    #[test]
    fn conflict_message_names_attempts() {
        let err = PrefsError::Conflict { attempts: 6 };
        assert!(err.to_string().contains("6 attempts"));
        assert_eq!(err.code(), ErrorCode::RecordConflict);
    }
}
