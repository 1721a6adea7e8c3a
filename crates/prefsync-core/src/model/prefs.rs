//! Typed payloads for the scalar and moderation preference kinds.
//!
//! Unknown fields are kept in `extra` so a round trip through this client
//! never strips data written by a newer one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validate::{Validate, ValidationError, ValidationScope, check_length};
use crate::syntax::{AtUri, ensure_valid_did};

const MAX_INTEREST_TAGS: usize = 100;
const MAX_TAG_BYTES: usize = 640;
const MAX_TAG_CHARS: usize = 64;
const MAX_GUIDE_BYTES: usize = 100;
const MAX_NUDGES: usize = 1_000;

// ---------------------------------------------------------------------------
// Adult content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdultContentPref {
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Validate for AdultContentPref {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Content labels
// ---------------------------------------------------------------------------

/// How content carrying a label is presented.
///
/// `Show` is a legacy spelling; readers treat it as [`LabelVisibility::Ignore`].
/// Values written by newer clients survive as [`LabelVisibility::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LabelVisibility {
    Ignore,
    Show,
    Warn,
    Hide,
    Other(String),
}

impl LabelVisibility {
    /// Collapse the legacy `show` spelling onto `ignore`.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Show => Self::Ignore,
            other => other,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ignore => "ignore",
            Self::Show => "show",
            Self::Warn => "warn",
            Self::Hide => "hide",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for LabelVisibility {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "ignore" => Self::Ignore,
            "show" => Self::Show,
            "warn" => Self::Warn,
            "hide" => Self::Hide,
            _ => Self::Other(raw),
        }
    }
}

impl From<LabelVisibility> for String {
    fn from(visibility: LabelVisibility) -> Self {
        match visibility {
            LabelVisibility::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentLabelPref {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labeler_did: Option<String>,
    pub visibility: LabelVisibility,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ContentLabelPref {
    #[must_use]
    pub fn new(label: impl Into<String>, labeler_did: Option<String>, visibility: LabelVisibility) -> Self {
        Self {
            label: label.into(),
            labeler_did,
            visibility,
            extra: BTreeMap::new(),
        }
    }

    /// Whether this preference is keyed by `label` and `labeler_did`.
    #[must_use]
    pub fn matches(&self, label: &str, labeler_did: Option<&str>) -> bool {
        self.label == label && self.labeler_did.as_deref() == labeler_did
    }
}

impl Validate for ContentLabelPref {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.label.is_empty() {
            return Err(ValidationError::preference("label", "must not be empty"));
        }
        if let Some(did) = &self.labeler_did {
            ensure_valid_did(did)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Labelers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelerPrefItem {
    pub did: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl LabelerPrefItem {
    #[must_use]
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelersPref {
    pub labelers: Vec<LabelerPrefItem>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl LabelersPref {
    /// Configured labeler dids, in document order.
    #[must_use]
    pub fn dids(&self) -> Vec<String> {
        self.labelers.iter().map(|l| l.did.clone()).collect()
    }
}

impl Validate for LabelersPref {
    fn validate(&self) -> Result<(), ValidationError> {
        self.labelers
            .iter()
            .try_for_each(|labeler| ensure_valid_did(&labeler.did))
    }
}

// ---------------------------------------------------------------------------
// Personal details
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDetailsPref {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Validate for PersonalDetailsPref {
    fn validate(&self) -> Result<(), ValidationError> {
        match &self.birth_date {
            Some(raw) if chrono::DateTime::parse_from_rfc3339(raw).is_err() => Err(
                ValidationError::preference("birthDate", format!("`{raw}` is not an RFC 3339 datetime")),
            ),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Feed and thread view
// ---------------------------------------------------------------------------

/// Per-feed presentation settings. Every setting is optional on the wire;
/// the read-side view fills gaps from defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedViewPref {
    pub feed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_replies: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_replies_by_unfollowed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_replies_by_like_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_reposts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_quote_posts: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Partial update for [`FeedViewPref`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedViewPatch {
    pub hide_replies: Option<bool>,
    pub hide_replies_by_unfollowed: Option<bool>,
    pub hide_replies_by_like_count: Option<i64>,
    pub hide_reposts: Option<bool>,
    pub hide_quote_posts: Option<bool>,
}

impl FeedViewPref {
    /// Shallow-merge `patch` onto this preference.
    pub fn apply(&mut self, patch: FeedViewPatch) {
        self.hide_replies = patch.hide_replies.or(self.hide_replies);
        self.hide_replies_by_unfollowed = patch
            .hide_replies_by_unfollowed
            .or(self.hide_replies_by_unfollowed);
        self.hide_replies_by_like_count = patch
            .hide_replies_by_like_count
            .or(self.hide_replies_by_like_count);
        self.hide_reposts = patch.hide_reposts.or(self.hide_reposts);
        self.hide_quote_posts = patch.hide_quote_posts.or(self.hide_quote_posts);
    }
}

impl Validate for FeedViewPref {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.feed.is_empty() {
            return Err(ValidationError::preference("feed", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadViewPref {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prioritize_followed_users: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Partial update for [`ThreadViewPref`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadViewPatch {
    pub sort: Option<String>,
    pub prioritize_followed_users: Option<bool>,
}

impl ThreadViewPref {
    pub fn apply(&mut self, patch: ThreadViewPatch) {
        if patch.sort.is_some() {
            self.sort = patch.sort;
        }
        self.prioritize_followed_users = patch
            .prioritize_followed_users
            .or(self.prioritize_followed_users);
    }
}

impl Validate for ThreadViewPref {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.sort.as_deref() {
            Some("") => Err(ValidationError::preference("sort", "must not be empty")),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Interests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestsPref {
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestsPatch {
    pub tags: Option<Vec<String>>,
}

impl InterestsPref {
    pub fn apply(&mut self, patch: InterestsPatch) {
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
    }
}

impl Validate for InterestsPref {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.tags.len() > MAX_INTEREST_TAGS {
            return Err(ValidationError::preference(
                "tags",
                format!("at most {MAX_INTEREST_TAGS} tags are allowed"),
            ));
        }
        self.tags.iter().try_for_each(|tag| {
            check_length(ValidationScope::Preference, "tags", tag, MAX_TAG_BYTES, MAX_TAG_CHARS)
        })
    }
}

// ---------------------------------------------------------------------------
// Hidden posts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenPostsPref {
    pub items: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Validate for HiddenPostsPref {
    fn validate(&self) -> Result<(), ValidationError> {
        self.items
            .iter()
            .try_for_each(|uri| uri.parse::<AtUri>().map(drop))
    }
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressGuide {
    pub guide: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProgressGuide {
    #[must_use]
    pub fn new(guide: impl Into<String>) -> Self {
        Self {
            guide: guide.into(),
            extra: BTreeMap::new(),
        }
    }
}

impl Validate for ProgressGuide {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.guide.is_empty() {
            return Err(ValidationError::preference("guide", "must not be empty"));
        }
        check_length(
            ValidationScope::Preference,
            "guide",
            &self.guide,
            MAX_GUIDE_BYTES,
            MAX_GUIDE_BYTES,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatePref {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queued_nudges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_progress_guide: Option<ProgressGuide>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Validate for AppStatePref {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.queued_nudges.len() > MAX_NUDGES {
            return Err(ValidationError::preference(
                "queuedNudges",
                format!("at most {MAX_NUDGES} nudges may be queued"),
            ));
        }
        self.active_progress_guide
            .as_ref()
            .map_or(Ok(()), Validate::validate)
    }
}
