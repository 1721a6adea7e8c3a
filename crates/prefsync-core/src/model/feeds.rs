//! Saved-feed payloads for both schema generations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validate::{Validate, ValidationError};
use crate::syntax::{AtUri, FEED_GENERATOR_COLLECTION, LIST_COLLECTION};
use crate::tid::Tid;

/// Value of the synthetic timeline entry every migrated document starts with.
pub const FOLLOWING_TIMELINE: &str = "following";

/// Kind of a saved-feeds entry. Kinds this client does not know are kept
/// verbatim in [`SavedFeedType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SavedFeedType {
    Timeline,
    Feed,
    List,
    Other(String),
}

impl SavedFeedType {
    /// The type of a feed or list AT-URI, from its collection.
    #[must_use]
    pub fn infer(uri: &str) -> Option<Self> {
        match uri.parse::<AtUri>() {
            Ok(parsed) if parsed.collection() == FEED_GENERATOR_COLLECTION => Some(Self::Feed),
            Ok(parsed) if parsed.collection() == LIST_COLLECTION => Some(Self::List),
            _ => None,
        }
    }

    /// Types the legacy flat schema can represent.
    #[must_use]
    pub const fn is_legacy_supported(&self) -> bool {
        matches!(self, Self::Feed | Self::List)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Timeline => "timeline",
            Self::Feed => "feed",
            Self::List => "list",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for SavedFeedType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "timeline" => Self::Timeline,
            "feed" => Self::Feed,
            "list" => Self::List,
            _ => Self::Other(raw),
        }
    }
}

impl From<SavedFeedType> for String {
    fn from(feed_type: SavedFeedType) -> Self {
        match feed_type {
            SavedFeedType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// One entry of the ordered saved-feeds list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFeed {
    pub id: String,
    #[serde(rename = "type")]
    pub feed_type: SavedFeedType,
    pub value: String,
    pub pinned: bool,
}

impl SavedFeed {
    /// A new entry with a freshly generated id.
    #[must_use]
    pub fn new(feed_type: SavedFeedType, value: impl Into<String>, pinned: bool) -> Self {
        Self {
            id: Tid::next_str(),
            feed_type,
            value: value.into(),
            pinned,
        }
    }

    /// The pinned following-timeline entry.
    #[must_use]
    pub fn following_timeline() -> Self {
        Self::new(SavedFeedType::Timeline, FOLLOWING_TIMELINE, true)
    }

    /// Checks for an entry this client is about to write: a TID id, and a
    /// value that points into the collection its type names.
    ///
    /// Entries read from the store only need [`Validate::validate`]; other
    /// writers may use ids of their own.
    ///
    /// # Errors
    ///
    /// Returns a preference-scoped error naming the offending field.
    pub fn validate_for_write(&self) -> Result<(), ValidationError> {
        if !Tid::is_valid(&self.id) {
            return Err(ValidationError::preference(
                "id",
                format!("saved feed id `{}` is not a TID", self.id),
            ));
        }
        let expected = match &self.feed_type {
            SavedFeedType::Feed => FEED_GENERATOR_COLLECTION,
            SavedFeedType::List => LIST_COLLECTION,
            SavedFeedType::Timeline | SavedFeedType::Other(_) => return Ok(()),
        };
        let uri: AtUri = self.value.parse()?;
        if uri.collection() != expected {
            return Err(ValidationError::preference(
                "value",
                format!(
                    "saved feed of type `{}` must reference {expected}, got `{}`",
                    if expected == LIST_COLLECTION { "list" } else { "feed" },
                    uri.collection()
                ),
            ));
        }
        Ok(())
    }
}

/// Any string id and value is acceptable in a stored entry.
impl Validate for SavedFeed {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Legacy flat saved-feeds preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFeedsPref {
    pub saved: Vec<String>,
    pub pinned: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Validate for SavedFeedsPref {
    fn validate(&self) -> Result<(), ValidationError> {
        self.saved
            .iter()
            .chain(&self.pinned)
            .try_for_each(|uri| uri.parse::<AtUri>().map(drop))
    }
}

/// Ordered, uniquely identified saved-feeds preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFeedsPrefV2 {
    pub items: Vec<SavedFeed>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Validate for SavedFeedsPrefV2 {
    fn validate(&self) -> Result<(), ValidationError> {
        self.items.iter().try_for_each(Validate::validate)
    }
}

/// Split v2 entries into the legacy `(saved, pinned)` URI arrays.
#[must_use]
pub fn to_uri_arrays(items: &[SavedFeed]) -> (Vec<String>, Vec<String>) {
    let saved = items.iter().map(|f| f.value.clone()).collect();
    let pinned = items
        .iter()
        .filter(|f| f.pinned)
        .map(|f| f.value.clone())
        .collect();
    (saved, pinned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "at://did:plc:alice/app.bsky.feed.generator/hot";
    const LIST: &str = "at://did:plc:alice/app.bsky.graph.list/friends";

    #[test]
    fn infers_type_from_collection() {
        assert_eq!(SavedFeedType::infer(FEED), Some(SavedFeedType::Feed));
        assert_eq!(SavedFeedType::infer(LIST), Some(SavedFeedType::List));
        assert_eq!(SavedFeedType::infer("at://did:plc:alice/app.bsky.feed.post/1"), None);
        assert_eq!(SavedFeedType::infer("garbage"), None);
    }

    #[test]
    fn unknown_type_strings_round_trip() {
        let raw = serde_json::json!({
            "id": "3jzfcijpj2z2a",
            "type": "search",
            "value": "cats",
            "pinned": false,
        });
        let feed: SavedFeed = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(feed.feed_type, SavedFeedType::Other("search".into()));
        assert!(!feed.feed_type.is_legacy_supported());
        assert_eq!(serde_json::to_value(&feed).expect("encode"), raw);
    }

    #[test]
    fn write_checks_id_and_collection() {
        assert!(SavedFeed::new(SavedFeedType::Feed, FEED, true).validate_for_write().is_ok());
        assert!(SavedFeed::new(SavedFeedType::List, FEED, true).validate_for_write().is_err());
        assert!(
            SavedFeed::new(SavedFeedType::Feed, "not a uri", true)
                .validate_for_write()
                .is_err()
        );
        assert!(SavedFeed::following_timeline().validate_for_write().is_ok());

        let mut bad_id = SavedFeed::new(SavedFeedType::Feed, FEED, false);
        bad_id.id = "feed-1".into();
        assert!(bad_id.validate_for_write().is_err());
    }

    #[test]
    fn stored_entries_only_need_their_shape() {
        let pref: SavedFeedsPrefV2 = serde_json::from_value(serde_json::json!({
            "items": [
                {"id": "feed-1", "type": "feed", "value": FEED, "pinned": true},
                {"id": "3jzfcijpj2z2a", "type": "list", "value": FEED, "pinned": false},
            ],
        }))
        .expect("decode");
        assert!(pref.validate().is_ok());
    }

    #[test]
    fn uri_arrays_split_pinned() {
        let items = vec![
            SavedFeed::new(SavedFeedType::Feed, FEED, true),
            SavedFeed::new(SavedFeedType::List, LIST, false),
        ];
        let (saved, pinned) = to_uri_arrays(&items);
        assert_eq!(saved, vec![FEED.to_string(), LIST.to_string()]);
        assert_eq!(pinned, vec![FEED.to_string()]);
    }
}
