//! Saved feeds across both schema generations.
//!
//! The legacy item is two flat URI arrays (`saved`, `pinned`). The current
//! item is an ordered list of [`SavedFeed`] entries, unique by id, with every
//! pinned entry ahead of every unpinned one. Documents written before the
//! current schema are migrated once at read time; after that the legacy item
//! is only ever written as a mirror of the current one, and only when the
//! account still has it.

use tracing::info;

use crate::coordinator::Update;
use crate::error::PrefsError;
use crate::model::feeds::to_uri_arrays;
use crate::model::validate::Validate;
use crate::model::{
    PreferenceItem, PreferenceKind, SavedFeed, SavedFeedType, SavedFeedsPref, SavedFeedsPrefV2,
    last_saved_feeds_v1, last_saved_feeds_v2, replace_kind,
};

/// A saved feed the caller wants added; it gets a fresh id on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFeedDraft {
    pub feed_type: SavedFeedType,
    pub value: String,
    pub pinned: bool,
}

impl SavedFeedDraft {
    #[must_use]
    pub fn new(feed_type: SavedFeedType, value: impl Into<String>, pinned: bool) -> Self {
        Self {
            feed_type,
            value: value.into(),
            pinned,
        }
    }

    #[must_use]
    pub fn into_saved_feed(self) -> SavedFeed {
        SavedFeed::new(self.feed_type, self.value, self.pinned)
    }
}

/// Keep the latest occurrence of each id, at the position of that occurrence.
#[must_use]
pub fn dedup_by_id(feeds: Vec<SavedFeed>) -> Vec<SavedFeed> {
    let mut out: Vec<SavedFeed> = Vec::with_capacity(feeds.len());
    for feed in feeds {
        out.retain(|kept| kept.id != feed.id);
        out.push(feed);
    }
    out
}

/// Stable partition: pinned entries first, order kept within each group.
#[must_use]
pub fn pinned_first(feeds: Vec<SavedFeed>) -> Vec<SavedFeed> {
    let (mut pinned, unpinned): (Vec<_>, Vec<_>) = feeds.into_iter().partition(|f| f.pinned);
    pinned.extend(unpinned);
    pinned
}

/// Whether `feeds` satisfies the pinned-before-unpinned ordering.
#[must_use]
pub fn is_pinned_first(feeds: &[SavedFeed]) -> bool {
    feeds
        .iter()
        .position(|f| !f.pinned)
        .is_none_or(|first_unpinned| feeds[first_unpinned..].iter().all(|f| !f.pinned))
}

/// Order-preserving union of `base` and `extra`.
fn union(base: &[String], extra: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(base.len() + extra.len());
    for uri in base.iter().cloned().chain(extra) {
        if !out.contains(&uri) {
            out.push(uri);
        }
    }
    out
}

/// The common write path for every current-schema mutation.
///
/// `mutate` receives the entries of the last valid current item (or none).
/// Its result is de-duplicated by id and reordered pinned-first before it
/// replaces every current item. If a valid legacy item exists, it is
/// rewritten to include the URIs of the feed and list entries.
///
/// Entries already in the document are carried as they are; callers check
/// the entries they introduce with [`check_entries`] first.
///
/// # Errors
///
/// Returns a validation error if the resulting item is malformed.
pub fn apply_saved_feeds<F>(items: Vec<PreferenceItem>, mutate: F) -> Result<Update, PrefsError>
where
    F: FnOnce(Vec<SavedFeed>) -> Vec<SavedFeed>,
{
    let existing = last_saved_feeds_v2(&items).cloned();
    let legacy = last_saved_feeds_v1(&items).cloned();

    let (current, extra) = existing.map_or_else(
        || (Vec::new(), Default::default()),
        |pref| (pref.items, pref.extra),
    );
    let pref = SavedFeedsPrefV2 {
        items: pinned_first(dedup_by_id(mutate(current))),
        extra,
    };
    pref.validate()?;

    let mirror = legacy.map(|legacy| {
        let supported: Vec<SavedFeed> = pref
            .items
            .iter()
            .filter(|f| f.feed_type.is_legacy_supported())
            .cloned()
            .collect();
        let (saved, pinned) = to_uri_arrays(&supported);
        SavedFeedsPref {
            saved: union(&legacy.saved, saved),
            pinned: union(&legacy.pinned, pinned),
            extra: legacy.extra,
        }
    });

    let mut next_items = replace_kind(
        items,
        PreferenceKind::SavedFeedsV2,
        PreferenceItem::SavedFeedsV2(pref),
    );
    if let Some(mirror) = mirror {
        next_items = replace_kind(
            next_items,
            PreferenceKind::SavedFeeds,
            PreferenceItem::SavedFeeds(mirror),
        );
    }
    Ok(Update::Replace(next_items))
}

/// Write-side checks for entries supplied by the caller.
///
/// # Errors
///
/// The first entry without a TID id or with a value outside its type's
/// collection.
pub fn check_entries(feeds: &[SavedFeed]) -> Result<(), PrefsError> {
    feeds
        .iter()
        .try_for_each(SavedFeed::validate_for_write)
        .map_err(PrefsError::from)
}

/// Replace the whole list.
///
/// # Errors
///
/// A validation error if any given entry fails [`check_entries`].
pub fn overwrite_saved_feeds(
    items: Vec<PreferenceItem>,
    feeds: Vec<SavedFeed>,
) -> Result<Update, PrefsError> {
    check_entries(&feeds)?;
    apply_saved_feeds(items, |_| feeds)
}

/// Apply the `pinned` flag of each given entry to the entry with its id.
/// Entries with unknown ids are ignored; no other field is changed.
///
/// # Errors
///
/// A validation error if any given entry fails [`check_entries`].
pub fn update_saved_feeds(
    items: Vec<PreferenceItem>,
    updates: &[SavedFeed],
) -> Result<Update, PrefsError> {
    check_entries(updates)?;
    apply_saved_feeds(items, |current| {
        current
            .into_iter()
            .map(|mut feed| {
                if let Some(update) = updates.iter().find(|u| u.id == feed.id) {
                    feed.pinned = update.pinned;
                }
                feed
            })
            .collect()
    })
}

/// Append entries (which already carry their fresh ids).
///
/// # Errors
///
/// A validation error if any given entry fails [`check_entries`].
pub fn add_saved_feeds(
    items: Vec<PreferenceItem>,
    feeds: Vec<SavedFeed>,
) -> Result<Update, PrefsError> {
    check_entries(&feeds)?;
    apply_saved_feeds(items, |mut current| {
        current.extend(feeds);
        current
    })
}

/// # Errors
///
/// Only if the remaining item fails to validate.
pub fn remove_saved_feeds(items: Vec<PreferenceItem>, ids: &[String]) -> Result<Update, PrefsError> {
    apply_saved_feeds(items, |current| {
        current
            .into_iter()
            .filter(|feed| !ids.contains(&feed.id))
            .collect()
    })
}

/// Build the current-schema list from a legacy-only document.
///
/// Returns `None` when a valid current item already exists.
#[must_use]
pub fn migrated_saved_feeds(items: &[PreferenceItem]) -> Option<Vec<SavedFeed>> {
    if last_saved_feeds_v2(items).is_some() {
        return None;
    }
    let mut feeds = vec![SavedFeed::following_timeline()];
    if let Some(legacy) = last_saved_feeds_v1(items) {
        let pinned = legacy.pinned.iter().map(|uri| (uri, true));
        let saved = legacy.saved.iter().map(|uri| (uri, false));
        for (uri, is_pinned) in pinned.chain(saved) {
            let Some(feed_type) = SavedFeedType::infer(uri) else {
                continue;
            };
            if feeds.iter().any(|f| &f.value == uri) {
                continue;
            }
            feeds.push(SavedFeed::new(feed_type, uri.clone(), is_pinned));
        }
    }
    Some(feeds)
}

/// One-time read-path migration. A document that already has a valid
/// current item is left alone, so running this twice writes once.
///
/// # Errors
///
/// A validation error if a migrated entry is malformed.
pub fn migrate_saved_feeds(items: Vec<PreferenceItem>) -> Result<Update, PrefsError> {
    let Some(feeds) = migrated_saved_feeds(&items) else {
        return Ok(Update::Unchanged);
    };
    info!(entries = feeds.len(), "migrating saved feeds to the ordered schema");
    overwrite_saved_feeds(items, feeds)
}
