//! Client app state: queued nudges and the active progress guide.

use super::replace_validated;
use crate::coordinator::Update;
use crate::error::PrefsError;
use crate::model::validate::Validate;
use crate::model::{PreferenceItem, PreferenceKind, ProgressGuide, last_app_state};

/// Queue nudges not already queued.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if the queue exceeds its bound.
pub fn queue_nudges(items: Vec<PreferenceItem>, nudges: &[String]) -> Result<Update, PrefsError> {
    let mut pref = last_app_state(&items).cloned().unwrap_or_default();
    for nudge in nudges {
        if !pref.queued_nudges.contains(nudge) {
            pref.queued_nudges.push(nudge.clone());
        }
    }
    replace_validated(items, PreferenceKind::AppState, pref, PreferenceItem::AppState)
}

/// Remove the given nudges from the queue.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if the merged item is malformed.
pub fn dismiss_nudges(items: Vec<PreferenceItem>, nudges: &[String]) -> Result<Update, PrefsError> {
    let mut pref = last_app_state(&items).cloned().unwrap_or_default();
    pref.queued_nudges.retain(|queued| !nudges.contains(queued));
    replace_validated(items, PreferenceKind::AppState, pref, PreferenceItem::AppState)
}

/// Replace the active progress guide; `None` clears it.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] for a malformed guide.
pub fn set_active_progress_guide(
    items: Vec<PreferenceItem>,
    guide: Option<ProgressGuide>,
) -> Result<Update, PrefsError> {
    if let Some(guide) = &guide {
        guide.validate()?;
    }
    let mut pref = last_app_state(&items).cloned().unwrap_or_default();
    pref.active_progress_guide = guide;
    replace_validated(items, PreferenceKind::AppState, pref, PreferenceItem::AppState)
}
