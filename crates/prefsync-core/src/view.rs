//! Read-side view of the preferences document.
//!
//! [`Preferences::from_items`] folds the document front to back over valid
//! items only, so the last valid item of each kind (or key) wins. Nothing
//! here writes; in particular the legacy label aliases are mirrored into
//! the returned label map and never persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{
    ContentLabelPref, FeedViewPref, LabelVisibility, MutedWord, PreferenceItem, ProgressGuide,
    SavedFeed, ThreadViewPref,
};
use crate::reducers::LEGACY_LABEL_ALIASES;

/// Feed whose view settings are always present.
pub const HOME_FEED: &str = "home";

/// Global label visibilities before any preference is applied.
pub const DEFAULT_LABEL_SETTINGS: [(&str, LabelVisibility); 4] = [
    ("porn", LabelVisibility::Hide),
    ("sexual", LabelVisibility::Warn),
    ("nudity", LabelVisibility::Ignore),
    ("graphic-media", LabelVisibility::Warn),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedViewSettings {
    pub hide_replies: bool,
    pub hide_replies_by_unfollowed: bool,
    pub hide_replies_by_like_count: i64,
    pub hide_reposts: bool,
    pub hide_quote_posts: bool,
}

impl Default for FeedViewSettings {
    fn default() -> Self {
        Self {
            hide_replies: false,
            hide_replies_by_unfollowed: true,
            hide_replies_by_like_count: 0,
            hide_reposts: false,
            hide_quote_posts: false,
        }
    }
}

impl FeedViewSettings {
    fn from_pref(pref: &FeedViewPref) -> Self {
        let defaults = Self::default();
        Self {
            hide_replies: pref.hide_replies.unwrap_or(defaults.hide_replies),
            hide_replies_by_unfollowed: pref
                .hide_replies_by_unfollowed
                .unwrap_or(defaults.hide_replies_by_unfollowed),
            hide_replies_by_like_count: pref
                .hide_replies_by_like_count
                .unwrap_or(defaults.hide_replies_by_like_count),
            hide_reposts: pref.hide_reposts.unwrap_or(defaults.hide_reposts),
            hide_quote_posts: pref.hide_quote_posts.unwrap_or(defaults.hide_quote_posts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadViewSettings {
    pub sort: String,
    pub prioritize_followed_users: bool,
}

impl Default for ThreadViewSettings {
    fn default() -> Self {
        Self {
            sort: "oldest".to_string(),
            prioritize_followed_users: true,
        }
    }
}

impl ThreadViewSettings {
    fn merge(&mut self, pref: &ThreadViewPref) {
        if let Some(sort) = &pref.sort {
            self.sort.clone_from(sort);
        }
        if let Some(prioritize) = pref.prioritize_followed_users {
            self.prioritize_followed_users = prioritize;
        }
    }
}

/// A labeler the account listens to, with its per-label overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationLabeler {
    pub did: String,
    pub labels: BTreeMap<String, LabelVisibility>,
}

impl ModerationLabeler {
    fn new(did: &str) -> Self {
        Self {
            did: did.to_string(),
            labels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationPrefs {
    pub adult_content_enabled: bool,
    pub labels: BTreeMap<String, LabelVisibility>,
    /// App labelers first, then the account's own.
    pub labelers: Vec<ModerationLabeler>,
    pub muted_words: Vec<MutedWord>,
    pub hidden_posts: Vec<String>,
}

/// Legacy saved-feeds arrays as last written, if the account has them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LegacyFeeds {
    pub saved: Option<Vec<String>>,
    pub pinned: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateView {
    pub queued_nudges: Vec<String>,
    pub active_progress_guide: Option<ProgressGuide>,
}

/// Everything a client needs to render the account's settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// `None` when the document has no valid ordered saved-feeds item yet.
    pub saved_feeds: Option<Vec<SavedFeed>>,
    pub feeds: LegacyFeeds,
    pub feed_view_prefs: BTreeMap<String, FeedViewSettings>,
    pub thread_view_prefs: ThreadViewSettings,
    pub moderation_prefs: ModerationPrefs,
    pub birth_date: Option<DateTime<Utc>>,
    pub interests: Vec<String>,
    pub app_state: AppStateView,
}

impl Preferences {
    /// Build the view from a document and the app labeler set.
    #[must_use]
    pub fn from_items(items: &[PreferenceItem], app_labelers: &[String]) -> Self {
        let app_labeler_views = || {
            app_labelers
                .iter()
                .map(|did| ModerationLabeler::new(did))
                .collect::<Vec<_>>()
        };
        let mut prefs = Self {
            saved_feeds: None,
            feeds: LegacyFeeds::default(),
            feed_view_prefs: BTreeMap::from([(HOME_FEED.to_string(), FeedViewSettings::default())]),
            thread_view_prefs: ThreadViewSettings::default(),
            moderation_prefs: ModerationPrefs {
                adult_content_enabled: false,
                labels: DEFAULT_LABEL_SETTINGS
                    .iter()
                    .map(|(label, visibility)| ((*label).to_string(), visibility.clone()))
                    .collect(),
                labelers: app_labeler_views(),
                muted_words: Vec::new(),
                hidden_posts: Vec::new(),
            },
            birth_date: None,
            interests: Vec::new(),
            app_state: AppStateView::default(),
        };

        let mut label_prefs: Vec<&ContentLabelPref> = Vec::new();
        for item in items {
            match item {
                PreferenceItem::AdultContent(pref) => {
                    prefs.moderation_prefs.adult_content_enabled = pref.enabled;
                }
                PreferenceItem::ContentLabel(pref) => label_prefs.push(pref),
                PreferenceItem::Labelers(pref) => {
                    let mut labelers = app_labeler_views();
                    labelers.extend(pref.labelers.iter().map(|l| ModerationLabeler::new(&l.did)));
                    prefs.moderation_prefs.labelers = labelers;
                }
                PreferenceItem::SavedFeedsV2(pref) => prefs.saved_feeds = Some(pref.items.clone()),
                PreferenceItem::SavedFeeds(pref) => {
                    prefs.feeds = LegacyFeeds {
                        saved: Some(pref.saved.clone()),
                        pinned: Some(pref.pinned.clone()),
                    };
                }
                PreferenceItem::PersonalDetails(pref) => {
                    if let Some(raw) = &pref.birth_date {
                        prefs.birth_date = DateTime::parse_from_rfc3339(raw)
                            .ok()
                            .map(|date| date.with_timezone(&Utc));
                    }
                }
                PreferenceItem::FeedView(pref) => {
                    prefs
                        .feed_view_prefs
                        .insert(pref.feed.clone(), FeedViewSettings::from_pref(pref));
                }
                PreferenceItem::ThreadView(pref) => prefs.thread_view_prefs.merge(pref),
                PreferenceItem::Interests(pref) => prefs.interests.clone_from(&pref.tags),
                PreferenceItem::MutedWords(pref) => {
                    prefs.moderation_prefs.muted_words.clone_from(&pref.items);
                }
                PreferenceItem::HiddenPosts(pref) => {
                    prefs.moderation_prefs.hidden_posts.clone_from(&pref.items);
                }
                PreferenceItem::AppState(pref) => {
                    prefs.app_state = AppStateView {
                        queued_nudges: pref.queued_nudges.clone(),
                        active_progress_guide: pref.active_progress_guide.clone(),
                    };
                }
                PreferenceItem::Opaque(_) => {}
            }
        }

        for pref in label_prefs {
            let visibility = pref.visibility.clone().normalized();
            match &pref.labeler_did {
                Some(did) => {
                    if let Some(labeler) = prefs
                        .moderation_prefs
                        .labelers
                        .iter_mut()
                        .find(|labeler| &labeler.did == did)
                    {
                        labeler.labels.insert(pref.label.clone(), visibility);
                    }
                }
                None => {
                    prefs
                        .moderation_prefs
                        .labels
                        .insert(pref.label.clone(), visibility);
                }
            }
        }
        mirror_legacy_labels(&mut prefs.moderation_prefs.labels);

        prefs
    }

    /// Labeler dids to consult: app labelers then configured ones.
    #[must_use]
    pub fn labeler_dids(&self) -> Vec<String> {
        self.moderation_prefs
            .labelers
            .iter()
            .map(|labeler| labeler.did.clone())
            .collect()
    }
}

/// Copy each legacy-named label onto its current name.
fn mirror_legacy_labels(labels: &mut BTreeMap<String, LabelVisibility>) {
    for (current, legacy) in LEGACY_LABEL_ALIASES {
        if let Some(visibility) = labels.get(legacy).cloned() {
            labels.insert(current.to_string(), visibility);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decode_document;
    use serde_json::json;

    const APP: &str = "did:plc:app";

    fn view(raw: Vec<serde_json::Value>) -> Preferences {
        Preferences::from_items(&decode_document(raw), &[APP.to_string()])
    }

    #[test]
    fn empty_document_yields_defaults() {
        let prefs = view(Vec::new());
        assert!(prefs.saved_feeds.is_none());
        assert_eq!(prefs.feed_view_prefs[HOME_FEED], FeedViewSettings::default());
        assert!(prefs.feed_view_prefs[HOME_FEED].hide_replies_by_unfollowed);
        assert_eq!(prefs.thread_view_prefs.sort, "oldest");
        assert!(prefs.thread_view_prefs.prioritize_followed_users);
        assert!(!prefs.moderation_prefs.adult_content_enabled);
        assert_eq!(prefs.labeler_dids(), vec![APP.to_string()]);
        assert_eq!(prefs.moderation_prefs.labels["porn"], LabelVisibility::Hide);
    }

    #[test]
    fn last_valid_item_wins() {
        let prefs = view(vec![
            json!({"$type": "app.bsky.actor.defs#adultContentPref", "enabled": true}),
            json!({"$type": "app.bsky.actor.defs#adultContentPref", "enabled": false}),
            json!({"$type": "app.bsky.actor.defs#adultContentPref", "enabled": "garbage"}),
        ]);
        assert!(!prefs.moderation_prefs.adult_content_enabled);
    }

    #[test]
    fn show_reads_as_ignore_and_legacy_names_mirror() {
        let prefs = view(vec![
            json!({"$type": "app.bsky.actor.defs#contentLabelPref", "label": "gore", "visibility": "show"}),
            json!({"$type": "app.bsky.actor.defs#contentLabelPref", "label": "nsfw", "visibility": "warn"}),
        ]);
        let labels = &prefs.moderation_prefs.labels;
        assert_eq!(labels["gore"], LabelVisibility::Ignore);
        assert_eq!(labels["graphic-media"], LabelVisibility::Ignore);
        assert_eq!(labels["nsfw"], LabelVisibility::Warn);
        assert_eq!(labels["porn"], LabelVisibility::Warn);
        assert_eq!(labels["sexual"], LabelVisibility::Warn);
    }

    #[test]
    fn labeler_scoped_labels_need_a_known_labeler() {
        let prefs = view(vec![
            json!({"$type": "app.bsky.actor.defs#labelersPref", "labelers": [{"did": "did:plc:mod"}]}),
            json!({"$type": "app.bsky.actor.defs#contentLabelPref", "label": "spam", "labelerDid": "did:plc:mod", "visibility": "hide"}),
            json!({"$type": "app.bsky.actor.defs#contentLabelPref", "label": "spam", "labelerDid": "did:plc:gone", "visibility": "hide"}),
        ]);
        let labelers = &prefs.moderation_prefs.labelers;
        assert_eq!(prefs.labeler_dids(), vec![APP.to_string(), "did:plc:mod".to_string()]);
        assert_eq!(labelers[1].labels["spam"], LabelVisibility::Hide);
        assert!(labelers[0].labels.is_empty());
        assert!(!prefs.moderation_prefs.labels.contains_key("spam"));
    }

    #[test]
    fn feed_view_fills_gaps_from_defaults() {
        let prefs = view(vec![json!({
            "$type": "app.bsky.actor.defs#feedViewPref",
            "feed": "home",
            "hideReposts": true,
        })]);
        let home = prefs.feed_view_prefs[HOME_FEED];
        assert!(home.hide_reposts);
        assert!(home.hide_replies_by_unfollowed);
        assert_eq!(home.hide_replies_by_like_count, 0);
    }
}
