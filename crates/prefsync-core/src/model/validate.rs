//! Shape checks applied to preference items and records.
//!
//! Decoding from the store runs [`Validate::validate`] on every known kind;
//! a failure turns the item into an opaque entry instead of an error, so a
//! malformed payload written by some other client is a data case. Values
//! built locally are validated before they are committed, and a failure
//! there aborts the whole update.

use std::fmt;

use crate::error::ErrorCode;

/// What kind of value failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationScope {
    Preference,
    Record,
    Identifier,
}

impl fmt::Display for ValidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Preference => "preference",
            Self::Record => "record",
            Self::Identifier => "identifier",
        };
        f.write_str(label)
    }
}

/// A value failed its shape check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: invalid {scope} field `{field}`: {reason}", scope_code(.scope))]
pub struct ValidationError {
    pub scope: ValidationScope,
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    #[must_use]
    pub fn preference(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            scope: ValidationScope::Preference,
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn record(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            scope: ValidationScope::Record,
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn identifier(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            scope: ValidationScope::Identifier,
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self.scope {
            ValidationScope::Preference => ErrorCode::InvalidPreference,
            ValidationScope::Record => ErrorCode::InvalidRecord,
            ValidationScope::Identifier => ErrorCode::InvalidIdentifier,
        }
    }
}

const fn scope_code(scope: &ValidationScope) -> &'static str {
    match scope {
        ValidationScope::Preference => ErrorCode::InvalidPreference.code(),
        ValidationScope::Record => ErrorCode::InvalidRecord.code(),
        ValidationScope::Identifier => ErrorCode::InvalidIdentifier.code(),
    }
}

/// Shape check for a typed payload.
pub trait Validate {
    /// # Errors
    ///
    /// Returns the first field that does not satisfy the payload's schema.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Check an upper bound on both byte length and character count.
///
/// # Errors
///
/// Returns a [`ValidationError`] in `scope` naming `field` when either limit
/// is exceeded.
pub fn check_length(
    scope: ValidationScope,
    field: &str,
    value: &str,
    max_bytes: usize,
    max_chars: usize,
) -> Result<(), ValidationError> {
    let error = |reason: String| ValidationError {
        scope,
        field: field.to_string(),
        reason,
    };
    if value.len() > max_bytes {
        return Err(error(format!(
            "{} bytes exceeds the limit of {max_bytes}",
            value.len()
        )));
    }
    let chars = value.chars().count();
    if chars > max_chars {
        return Err(error(format!(
            "{chars} characters exceeds the limit of {max_chars}"
        )));
    }
    Ok(())
}
