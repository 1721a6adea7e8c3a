//! Personal details, feed/thread view settings, and interests.

use chrono::{DateTime, SecondsFormat, Utc};

use super::replace_validated;
use crate::coordinator::Update;
use crate::error::PrefsError;
use crate::model::validate::Validate;
use crate::model::{
    FeedViewPatch, FeedViewPref, InterestsPatch, PreferenceItem, PreferenceKind, ThreadViewPatch,
    last_feed_view, last_interests, last_personal_details, last_thread_view,
};

/// Set or clear the birth date.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if the merged item is malformed.
pub fn set_personal_details(
    items: Vec<PreferenceItem>,
    birth_date: Option<DateTime<Utc>>,
) -> Result<Update, PrefsError> {
    let mut pref = last_personal_details(&items).cloned().unwrap_or_default();
    pref.birth_date = birth_date.map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true));
    replace_validated(
        items,
        PreferenceKind::PersonalDetails,
        pref,
        PreferenceItem::PersonalDetails,
    )
}

fn is_feed_view_for(item: &PreferenceItem, feed: &str) -> bool {
    match item {
        PreferenceItem::FeedView(pref) => pref.feed == feed,
        PreferenceItem::Opaque(opaque) if opaque.kind == Some(PreferenceKind::FeedView) => {
            opaque.str_field("feed") == Some(feed)
        }
        _ => false,
    }
}

/// Merge `patch` into the settings for one feed. Other feeds are untouched.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if the merged item is malformed.
pub fn set_feed_view_prefs(
    items: Vec<PreferenceItem>,
    feed: &str,
    patch: FeedViewPatch,
) -> Result<Update, PrefsError> {
    let mut pref = last_feed_view(&items, feed).cloned().unwrap_or_else(|| FeedViewPref {
        feed: feed.to_string(),
        ..FeedViewPref::default()
    });
    pref.apply(patch);
    pref.validate()?;

    let mut next: Vec<PreferenceItem> = items
        .into_iter()
        .filter(|item| !is_feed_view_for(item, feed))
        .collect();
    next.push(PreferenceItem::FeedView(pref));
    Ok(Update::Replace(next))
}

/// Merge `patch` into the thread view settings.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if the merged item is malformed.
pub fn set_thread_view_prefs(
    items: Vec<PreferenceItem>,
    patch: ThreadViewPatch,
) -> Result<Update, PrefsError> {
    let mut pref = last_thread_view(&items).cloned().unwrap_or_default();
    pref.apply(patch);
    replace_validated(items, PreferenceKind::ThreadView, pref, PreferenceItem::ThreadView)
}

/// # Errors
///
/// Returns [`PrefsError::Validation`] if a tag is too long or there are too many.
pub fn set_interests_pref(
    items: Vec<PreferenceItem>,
    patch: InterestsPatch,
) -> Result<Update, PrefsError> {
    let mut pref = last_interests(&items).cloned().unwrap_or_default();
    pref.apply(patch);
    replace_validated(items, PreferenceKind::Interests, pref, PreferenceItem::Interests)
}
