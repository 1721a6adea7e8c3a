//! Adult content, content labels, and the labeler list.

use tracing::info;

use super::replace_validated;
use crate::coordinator::Update;
use crate::error::PrefsError;
use crate::model::validate::Validate;
use crate::model::{
    AdultContentPref, ContentLabelPref, LabelVisibility, LabelerPrefItem, PreferenceItem,
    PreferenceKind, last_adult_content, last_content_label, last_labelers,
};
use crate::syntax::ensure_valid_did;

/// `(current name, legacy name)` pairs for global content labels.
pub const LEGACY_LABEL_ALIASES: [(&str, &str); 3] = [
    ("graphic-media", "gore"),
    ("porn", "nsfw"),
    ("sexual", "suggestive"),
];

/// The legacy name older readers use for a current global label.
#[must_use]
pub fn legacy_alias_of(label: &str) -> Option<&'static str> {
    LEGACY_LABEL_ALIASES
        .iter()
        .find(|(current, _)| *current == label)
        .map(|(_, legacy)| *legacy)
}

/// # Errors
///
/// Returns [`PrefsError::Validation`] if the merged item is malformed.
pub fn set_adult_content_enabled(
    items: Vec<PreferenceItem>,
    enabled: bool,
) -> Result<Update, PrefsError> {
    let mut pref = last_adult_content(&items).cloned().unwrap_or_default();
    pref.enabled = enabled;
    replace_validated(
        items,
        PreferenceKind::AdultContent,
        pref,
        PreferenceItem::AdultContent,
    )
}

/// Label and labeler of any content-label item, typed or not.
fn content_label_key(item: &PreferenceItem) -> Option<(Option<&str>, Option<&str>)> {
    match item {
        PreferenceItem::ContentLabel(pref) => {
            Some((Some(pref.label.as_str()), pref.labeler_did.as_deref()))
        }
        PreferenceItem::Opaque(opaque) if opaque.kind == Some(PreferenceKind::ContentLabel) => {
            Some((opaque.str_field("label"), opaque.str_field("labelerDid")))
        }
        _ => None,
    }
}

fn is_keyed(item: &PreferenceItem, label: &str, labeler_did: Option<&str>) -> bool {
    content_label_key(item) == Some((Some(label), labeler_did))
}

fn merged_label(
    items: &[PreferenceItem],
    label: &str,
    labeler_did: Option<&str>,
    visibility: LabelVisibility,
) -> ContentLabelPref {
    match last_content_label(items, label, labeler_did).cloned() {
        Some(mut pref) => {
            pref.visibility = visibility;
            pref
        }
        None => ContentLabelPref::new(label, labeler_did.map(str::to_string), visibility),
    }
}

/// Set the visibility of `label`, globally or for one labeler.
///
/// Setting a global preference for a label that has a legacy name also
/// writes the legacy-named global preference with the same visibility,
/// replacing any earlier one.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] for a malformed label or labeler did.
pub fn set_content_label_pref(
    items: Vec<PreferenceItem>,
    label: &str,
    visibility: LabelVisibility,
    labeler_did: Option<&str>,
) -> Result<Update, PrefsError> {
    if let Some(did) = labeler_did {
        ensure_valid_did(did)?;
    }

    let legacy = labeler_did
        .is_none()
        .then(|| legacy_alias_of(label))
        .flatten()
        .map(|legacy| merged_label(&items, legacy, None, visibility.clone()));
    let pref = merged_label(&items, label, labeler_did, visibility);
    pref.validate()?;

    let mut next: Vec<PreferenceItem> = items
        .into_iter()
        .filter(|item| !is_keyed(item, label, labeler_did))
        .collect();
    next.push(PreferenceItem::ContentLabel(pref));
    if let Some(legacy) = legacy {
        next.retain(|item| !is_keyed(item, &legacy.label, None));
        next.push(PreferenceItem::ContentLabel(legacy));
    }
    Ok(Update::Replace(next))
}

/// Subscribe to a labeler. Already-present dids leave the document alone.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if `did` is not a DID.
pub fn add_labeler(items: Vec<PreferenceItem>, did: &str) -> Result<Update, PrefsError> {
    ensure_valid_did(did)?;
    let mut pref = last_labelers(&items).cloned().unwrap_or_default();
    if pref.labelers.iter().any(|labeler| labeler.did == did) {
        return Ok(Update::Unchanged);
    }
    pref.labelers.push(LabelerPrefItem::new(did));
    info!(did, "labeler added");
    replace_validated(items, PreferenceKind::Labelers, pref, PreferenceItem::Labelers)
}

/// Unsubscribe from a labeler. Absent dids leave the document alone.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if the merged item is malformed.
pub fn remove_labeler(items: Vec<PreferenceItem>, did: &str) -> Result<Update, PrefsError> {
    let mut pref = last_labelers(&items).cloned().unwrap_or_default();
    let before = pref.labelers.len();
    pref.labelers.retain(|labeler| labeler.did != did);
    if pref.labelers.len() == before {
        return Ok(Update::Unchanged);
    }
    info!(did, "labeler removed");
    replace_validated(items, PreferenceKind::Labelers, pref, PreferenceItem::Labelers)
}

/// Labeler dids configured in the document, in document order.
#[must_use]
pub fn labeler_dids(items: &[PreferenceItem]) -> Vec<String> {
    last_labelers(items)
        .map(crate::model::LabelersPref::dids)
        .unwrap_or_default()
}
