//! The preferences document: an ordered list of kind-tagged items.
//!
//! Each item carries its kind on the wire in a `$type` field. Decoding never
//! fails for a JSON object: items of an unknown kind, and items of a known
//! kind whose payload does not validate, become [`PreferenceItem::Opaque`]
//! and are written back verbatim. The store does not deduplicate by kind, so
//! readers always resolve a kind to its *last valid* occurrence
//! ([`find_last`]).

pub mod feeds;
pub mod muted;
pub mod prefs;
pub mod validate;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub use feeds::{SavedFeed, SavedFeedType, SavedFeedsPref, SavedFeedsPrefV2};
pub use muted::{MutedWord, MutedWordTarget, MutedWordsPref};
pub use prefs::{
    AdultContentPref, AppStatePref, ContentLabelPref, FeedViewPatch, FeedViewPref,
    HiddenPostsPref, InterestsPatch, InterestsPref, LabelVisibility, LabelerPrefItem, LabelersPref,
    PersonalDetailsPref, ProgressGuide, ThreadViewPatch, ThreadViewPref,
};
use validate::Validate;

const TYPE_FIELD: &str = "$type";

// ---------------------------------------------------------------------------
// PreferenceKind
// ---------------------------------------------------------------------------

/// The preference kinds this client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKind {
    AdultContent,
    ContentLabel,
    Labelers,
    SavedFeeds,
    SavedFeedsV2,
    PersonalDetails,
    FeedView,
    ThreadView,
    Interests,
    MutedWords,
    HiddenPosts,
    AppState,
}

impl PreferenceKind {
    pub const ALL: [Self; 12] = [
        Self::AdultContent,
        Self::ContentLabel,
        Self::Labelers,
        Self::SavedFeeds,
        Self::SavedFeedsV2,
        Self::PersonalDetails,
        Self::FeedView,
        Self::ThreadView,
        Self::Interests,
        Self::MutedWords,
        Self::HiddenPosts,
        Self::AppState,
    ];

    /// The `$type` tag written on the wire.
    #[must_use]
    pub const fn type_tag(self) -> &'static str {
        match self {
            Self::AdultContent => "app.bsky.actor.defs#adultContentPref",
            Self::ContentLabel => "app.bsky.actor.defs#contentLabelPref",
            Self::Labelers => "app.bsky.actor.defs#labelersPref",
            Self::SavedFeeds => "app.bsky.actor.defs#savedFeedsPref",
            Self::SavedFeedsV2 => "app.bsky.actor.defs#savedFeedsPrefV2",
            Self::PersonalDetails => "app.bsky.actor.defs#personalDetailsPref",
            Self::FeedView => "app.bsky.actor.defs#feedViewPref",
            Self::ThreadView => "app.bsky.actor.defs#threadViewPref",
            Self::Interests => "app.bsky.actor.defs#interestsPref",
            Self::MutedWords => "app.bsky.actor.defs#mutedWordsPref",
            Self::HiddenPosts => "app.bsky.actor.defs#hiddenPostsPref",
            Self::AppState => "app.bsky.actor.defs#bskyAppStatePref",
        }
    }

    /// Look up a kind by its `$type` tag.
    #[must_use]
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_tag() == tag)
    }
}

impl fmt::Display for PreferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

// ---------------------------------------------------------------------------
// PreferenceItem
// ---------------------------------------------------------------------------

/// An item that could not be decoded into a typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueItem {
    /// The kind named by `$type`, when it is one this client knows.
    pub kind: Option<PreferenceKind>,
    pub raw: Value,
}

impl OpaqueItem {
    /// A top-level string field of the raw payload.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.raw.get(name).and_then(Value::as_str)
    }
}

/// One entry of the preferences document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceItem {
    AdultContent(AdultContentPref),
    ContentLabel(ContentLabelPref),
    Labelers(LabelersPref),
    SavedFeeds(SavedFeedsPref),
    SavedFeedsV2(SavedFeedsPrefV2),
    PersonalDetails(PersonalDetailsPref),
    FeedView(FeedViewPref),
    ThreadView(ThreadViewPref),
    Interests(InterestsPref),
    MutedWords(MutedWordsPref),
    HiddenPosts(HiddenPostsPref),
    AppState(AppStatePref),
    /// Unknown kind, or a known kind that failed validation.
    Opaque(OpaqueItem),
}

impl PreferenceItem {
    /// Decode an item from its wire form.
    ///
    /// Never fails: anything that cannot be typed is kept as
    /// [`PreferenceItem::Opaque`].
    #[must_use]
    pub fn from_value(raw: Value) -> Self {
        let kind = raw
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .and_then(PreferenceKind::from_type_tag);
        let Some(kind) = kind else {
            return Self::Opaque(OpaqueItem { kind: None, raw });
        };

        let mut body = match &raw {
            Value::Object(map) => map.clone(),
            _ => return Self::Opaque(OpaqueItem { kind: Some(kind), raw }),
        };
        body.remove(TYPE_FIELD);

        let decoded = match kind {
            PreferenceKind::AdultContent => typed(body, Self::AdultContent),
            PreferenceKind::ContentLabel => typed(body, Self::ContentLabel),
            PreferenceKind::Labelers => typed(body, Self::Labelers),
            PreferenceKind::SavedFeeds => typed(body, Self::SavedFeeds),
            PreferenceKind::SavedFeedsV2 => typed(body, Self::SavedFeedsV2),
            PreferenceKind::PersonalDetails => typed(body, Self::PersonalDetails),
            PreferenceKind::FeedView => typed(body, Self::FeedView),
            PreferenceKind::ThreadView => typed(body, Self::ThreadView),
            PreferenceKind::Interests => typed(body, Self::Interests),
            PreferenceKind::MutedWords => typed(body, Self::MutedWords),
            PreferenceKind::HiddenPosts => typed(body, Self::HiddenPosts),
            PreferenceKind::AppState => typed(body, Self::AppState),
        };

        match decoded {
            Ok(item) => item,
            Err(reason) => {
                tracing::debug!(kind = %kind, %reason, "keeping invalid preference item as opaque");
                Self::Opaque(OpaqueItem { kind: Some(kind), raw })
            }
        }
    }

    /// Encode this item to its wire form, `$type` included.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload fails to serialize (should not happen
    /// with well-formed data).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let (kind, body) = match self {
            Self::AdultContent(p) => (PreferenceKind::AdultContent, serde_json::to_value(p)?),
            Self::ContentLabel(p) => (PreferenceKind::ContentLabel, serde_json::to_value(p)?),
            Self::Labelers(p) => (PreferenceKind::Labelers, serde_json::to_value(p)?),
            Self::SavedFeeds(p) => (PreferenceKind::SavedFeeds, serde_json::to_value(p)?),
            Self::SavedFeedsV2(p) => (PreferenceKind::SavedFeedsV2, serde_json::to_value(p)?),
            Self::PersonalDetails(p) => {
                (PreferenceKind::PersonalDetails, serde_json::to_value(p)?)
            }
            Self::FeedView(p) => (PreferenceKind::FeedView, serde_json::to_value(p)?),
            Self::ThreadView(p) => (PreferenceKind::ThreadView, serde_json::to_value(p)?),
            Self::Interests(p) => (PreferenceKind::Interests, serde_json::to_value(p)?),
            Self::MutedWords(p) => (PreferenceKind::MutedWords, serde_json::to_value(p)?),
            Self::HiddenPosts(p) => (PreferenceKind::HiddenPosts, serde_json::to_value(p)?),
            Self::AppState(p) => (PreferenceKind::AppState, serde_json::to_value(p)?),
            Self::Opaque(opaque) => return Ok(opaque.raw.clone()),
        };

        let mut map = Map::new();
        map.insert(TYPE_FIELD.to_string(), Value::String(kind.type_tag().to_string()));
        if let Value::Object(fields) = body {
            map.extend(fields);
        }
        Ok(Value::Object(map))
    }

    /// The item's kind, including opaque items whose `$type` is known.
    #[must_use]
    pub const fn kind(&self) -> Option<PreferenceKind> {
        match self {
            Self::AdultContent(_) => Some(PreferenceKind::AdultContent),
            Self::ContentLabel(_) => Some(PreferenceKind::ContentLabel),
            Self::Labelers(_) => Some(PreferenceKind::Labelers),
            Self::SavedFeeds(_) => Some(PreferenceKind::SavedFeeds),
            Self::SavedFeedsV2(_) => Some(PreferenceKind::SavedFeedsV2),
            Self::PersonalDetails(_) => Some(PreferenceKind::PersonalDetails),
            Self::FeedView(_) => Some(PreferenceKind::FeedView),
            Self::ThreadView(_) => Some(PreferenceKind::ThreadView),
            Self::Interests(_) => Some(PreferenceKind::Interests),
            Self::MutedWords(_) => Some(PreferenceKind::MutedWords),
            Self::HiddenPosts(_) => Some(PreferenceKind::HiddenPosts),
            Self::AppState(_) => Some(PreferenceKind::AppState),
            Self::Opaque(opaque) => opaque.kind,
        }
    }

    #[must_use]
    pub const fn is_kind(&self, kind: PreferenceKind) -> bool {
        matches!(self.kind(), Some(k) if k as u8 == kind as u8)
    }

    /// Whether this item decoded into a typed, validated payload.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !matches!(self, Self::Opaque(_))
    }
}

fn typed<T, F>(body: Map<String, Value>, wrap: F) -> Result<PreferenceItem, String>
where
    T: DeserializeOwned + Validate,
    F: FnOnce(T) -> PreferenceItem,
{
    let payload: T = serde_json::from_value(Value::Object(body)).map_err(|e| e.to_string())?;
    payload.validate().map_err(|e| e.to_string())?;
    Ok(wrap(payload))
}

impl Serialize for PreferenceItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PreferenceItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

// ---------------------------------------------------------------------------
// Document helpers
// ---------------------------------------------------------------------------

/// Resolve a kind to its last valid occurrence.
///
/// `pick` selects the variant (and any key filter); the scan runs from the
/// end of the document so later items shadow earlier ones.
#[must_use]
pub fn find_last<'a, T, F>(items: &'a [PreferenceItem], pick: F) -> Option<&'a T>
where
    F: FnMut(&'a PreferenceItem) -> Option<&'a T>,
{
    items.iter().rev().find_map(pick)
}

/// Drop every item of `kind`, valid or not.
#[must_use]
pub fn without_kind(items: Vec<PreferenceItem>, kind: PreferenceKind) -> Vec<PreferenceItem> {
    items.into_iter().filter(|item| !item.is_kind(kind)).collect()
}

/// Drop every item of `kind` and append `replacement`.
#[must_use]
pub fn replace_kind(
    items: Vec<PreferenceItem>,
    kind: PreferenceKind,
    replacement: PreferenceItem,
) -> Vec<PreferenceItem> {
    let mut out = without_kind(items, kind);
    out.push(replacement);
    out
}

macro_rules! last_of {
    ($name:ident, $variant:ident, $ty:ty) => {
        #[doc = concat!("The last valid `", stringify!($variant), "` item, if any.")]
        #[must_use]
        pub fn $name(items: &[PreferenceItem]) -> Option<&$ty> {
            find_last(items, |item| match item {
                PreferenceItem::$variant(pref) => Some(pref),
                _ => None,
            })
        }
    };
}

last_of!(last_adult_content, AdultContent, AdultContentPref);
last_of!(last_labelers, Labelers, LabelersPref);
last_of!(last_saved_feeds_v1, SavedFeeds, SavedFeedsPref);
last_of!(last_saved_feeds_v2, SavedFeedsV2, SavedFeedsPrefV2);
last_of!(last_personal_details, PersonalDetails, PersonalDetailsPref);
last_of!(last_thread_view, ThreadView, ThreadViewPref);
last_of!(last_interests, Interests, InterestsPref);
last_of!(last_muted_words, MutedWords, MutedWordsPref);
last_of!(last_hidden_posts, HiddenPosts, HiddenPostsPref);
last_of!(last_app_state, AppState, AppStatePref);

/// The last valid content label preference for `label` and `labeler_did`.
#[must_use]
pub fn last_content_label<'a>(
    items: &'a [PreferenceItem],
    label: &str,
    labeler_did: Option<&str>,
) -> Option<&'a ContentLabelPref> {
    find_last(items, |item| match item {
        PreferenceItem::ContentLabel(pref) if pref.matches(label, labeler_did) => Some(pref),
        _ => None,
    })
}

/// The last valid feed view preference for `feed`.
#[must_use]
pub fn last_feed_view<'a>(items: &'a [PreferenceItem], feed: &str) -> Option<&'a FeedViewPref> {
    find_last(items, |item| match item {
        PreferenceItem::FeedView(pref) if pref.feed == feed => Some(pref),
        _ => None,
    })
}

/// Decode a whole document from its wire form.
#[must_use]
pub fn decode_document(raw: Vec<Value>) -> Vec<PreferenceItem> {
    raw.into_iter().map(PreferenceItem::from_value).collect()
}

/// Encode a whole document to its wire form.
///
/// # Errors
///
/// Returns the first serialization failure.
pub fn encode_document(items: &[PreferenceItem]) -> Result<Vec<Value>, serde_json::Error> {
    items.iter().map(PreferenceItem::to_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_tags_round_trip() {
        for kind in PreferenceKind::ALL {
            assert_eq!(PreferenceKind::from_type_tag(kind.type_tag()), Some(kind));
        }
        assert_eq!(PreferenceKind::from_type_tag("app.bsky.actor.defs#nope"), None);
    }

    #[test]
    fn decodes_known_kind() {
        let item = PreferenceItem::from_value(json!({
            "$type": "app.bsky.actor.defs#adultContentPref",
            "enabled": true,
        }));
        assert_eq!(
            item,
            PreferenceItem::AdultContent(AdultContentPref {
                enabled: true,
                ..AdultContentPref::default()
            })
        );
    }

    #[test]
    fn invalid_known_kind_becomes_opaque_with_kind() {
        let raw = json!({
            "$type": "app.bsky.actor.defs#contentLabelPref",
            "label": "porn",
            "visibility": "sometimes",
        });
        let item = PreferenceItem::from_value(raw.clone());
        assert!(!item.is_valid());
        assert_eq!(item.kind(), Some(PreferenceKind::ContentLabel));
        assert_eq!(item.to_value().expect("encode"), raw);
    }

    #[test]
    fn unknown_kind_is_preserved_verbatim() {
        let raw = json!({"$type": "com.example#futurePref", "x": 1});
        let item = PreferenceItem::from_value(raw.clone());
        assert_eq!(item.kind(), None);
        assert_eq!(serde_json::to_value(&item).expect("encode"), raw);
    }

    #[test]
    fn encoding_writes_type_tag_once() {
        let item = PreferenceItem::HiddenPosts(HiddenPostsPref {
            items: vec!["at://did:plc:a/app.bsky.feed.post/1".into()],
            ..HiddenPostsPref::default()
        });
        let value = item.to_value().expect("encode");
        assert_eq!(value["$type"], "app.bsky.actor.defs#hiddenPostsPref");
        let back = PreferenceItem::from_value(value);
        assert_eq!(back, item);
    }

    #[test]
    fn find_last_prefers_later_valid_items() {
        let items = decode_document(vec![
            json!({"$type": "app.bsky.actor.defs#adultContentPref", "enabled": true}),
            json!({"$type": "app.bsky.actor.defs#adultContentPref", "enabled": false}),
            json!({"$type": "app.bsky.actor.defs#adultContentPref", "enabled": "yes"}),
        ]);
        let last = last_adult_content(&items).expect("a valid item exists");
        assert!(!last.enabled);
    }

    #[test]
    fn replace_kind_drops_opaque_items_of_that_kind() {
        let items = decode_document(vec![
            json!({"$type": "app.bsky.actor.defs#adultContentPref", "enabled": "yes"}),
            json!({"$type": "app.bsky.actor.defs#interestsPref", "tags": ["cats"]}),
        ]);
        let replaced = replace_kind(
            items,
            PreferenceKind::AdultContent,
            PreferenceItem::AdultContent(AdultContentPref::default()),
        );
        assert_eq!(replaced.len(), 2);
        assert_eq!(replaced[0].kind(), Some(PreferenceKind::Interests));
        assert!(replaced[1].is_valid());
    }
}
