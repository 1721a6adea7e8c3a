//! Muted-word payloads and identity rules.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validate::{Validate, ValidationError, ValidationScope, check_length};
use crate::syntax::ensure_valid_did;

const MAX_VALUE_BYTES: usize = 10_000;
const MAX_VALUE_CHARS: usize = 1_000;

const MAX_TARGET_BYTES: usize = 640;
const MAX_TARGET_CHARS: usize = 64;

/// Where a muted word applies. The set is open; targets this client does not
/// know are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MutedWordTarget {
    Content,
    Tag,
    Other(String),
}

impl MutedWordTarget {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Content => "content",
            Self::Tag => "tag",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for MutedWordTarget {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "content" => Self::Content,
            "tag" => Self::Tag,
            _ => Self::Other(raw),
        }
    }
}

impl From<MutedWordTarget> for String {
    fn from(target: MutedWordTarget) -> Self {
        match target {
            MutedWordTarget::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutedWord {
    /// Absent on words written before ids were introduced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: String,
    #[serde(default)]
    pub targets: Vec<MutedWordTarget>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MutedWord {
    #[must_use]
    pub fn new(value: impl Into<String>, targets: Vec<MutedWordTarget>) -> Self {
        Self {
            id: None,
            value: value.into(),
            targets,
            actors: Vec::new(),
            expires_at: None,
            extra: BTreeMap::new(),
        }
    }

    /// Whether `self`, an item already in the document, is the word `candidate`
    /// refers to.
    ///
    /// An existing word with an id matches only by id. An existing word
    /// without one matches only by exact value.
    #[must_use]
    pub fn is_same_word(&self, candidate: &Self) -> bool {
        match &self.id {
            Some(id) => candidate.id.as_ref() == Some(id),
            None => self.value == candidate.value,
        }
    }
}

impl Validate for MutedWord {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.value.is_empty() {
            return Err(ValidationError::preference("value", "must not be empty"));
        }
        check_length(
            ValidationScope::Preference,
            "value",
            &self.value,
            MAX_VALUE_BYTES,
            MAX_VALUE_CHARS,
        )?;
        if matches!(self.id.as_deref(), Some("")) {
            return Err(ValidationError::preference("id", "must not be empty"));
        }
        for target in &self.targets {
            check_length(
                ValidationScope::Preference,
                "targets",
                target.as_str(),
                MAX_TARGET_BYTES,
                MAX_TARGET_CHARS,
            )?;
        }
        self.actors.iter().try_for_each(|did| ensure_valid_did(did))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutedWordsPref {
    pub items: Vec<MutedWord>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Validate for MutedWordsPref {
    fn validate(&self) -> Result<(), ValidationError> {
        self.items.iter().try_for_each(Validate::validate)
    }
}

/// Normalize a muted word as typed by a user.
///
/// Trims whitespace, drops one leading `#` (unless it starts a keycap emoji,
/// i.e. is followed by U+FE0F), and removes line breaks, soft hyphens and
/// zero-width characters.
#[must_use]
pub fn sanitize_muted_word_value(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_hash = match trimmed.strip_prefix('#') {
        Some(rest) if !rest.starts_with('\u{FE0F}') => rest,
        _ => trimmed,
    };
    without_hash
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\r' | '\n' | '\u{00AD}' | '\u{2060}' | '\u{200D}' | '\u{200C}' | '\u{200B}'
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(id: Option<&str>, value: &str) -> MutedWord {
        MutedWord {
            id: id.map(str::to_string),
            ..MutedWord::new(value, vec![MutedWordTarget::Content])
        }
    }

    #[test]
    fn id_match_ignores_value() {
        let existing = word(Some("a"), "foo");
        assert!(existing.is_same_word(&word(Some("a"), "bar")));
        assert!(!existing.is_same_word(&word(Some("b"), "foo")));
        assert!(!existing.is_same_word(&word(None, "foo")));
    }

    #[test]
    fn legacy_match_ignores_id() {
        let legacy = word(None, "foo");
        assert!(legacy.is_same_word(&word(None, "foo")));
        assert!(legacy.is_same_word(&word(Some("x"), "foo")));
        assert!(!legacy.is_same_word(&word(None, "Foo")));
    }

    #[test]
    fn sanitize_strips_hash_and_invisibles() {
        assert_eq!(sanitize_muted_word_value("  #spoilers "), "spoilers");
        assert_eq!(sanitize_muted_word_value("#\u{FE0F}\u{20E3}"), "#\u{FE0F}\u{20E3}");
        assert_eq!(sanitize_muted_word_value("ab\u{200B}c\nd"), "abcd");
        assert_eq!(sanitize_muted_word_value("##double"), "#double");
        assert_eq!(sanitize_muted_word_value(" \n "), "");
    }

    #[test]
    fn expiry_round_trips_as_rfc3339() {
        let raw = serde_json::json!({
            "id": "3jzfcijpj2z2a",
            "value": "foo",
            "targets": ["content", "tag"],
            "expiresAt": "2030-01-01T00:00:00Z",
        });
        let decoded: MutedWord = serde_json::from_value(raw).expect("decode");
        assert!(decoded.expires_at.is_some());
        assert_eq!(decoded.targets, vec![MutedWordTarget::Content, MutedWordTarget::Tag]);
    }

    #[test]
    fn unknown_targets_round_trip() {
        let raw = serde_json::json!({
            "value": "spoilers",
            "targets": ["content", "url"],
        });
        let decoded: MutedWord = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(
            decoded.targets,
            vec![MutedWordTarget::Content, MutedWordTarget::Other("url".into())]
        );
        assert!(decoded.validate().is_ok());
        assert_eq!(serde_json::to_value(&decoded).expect("encode"), raw);
    }
}
