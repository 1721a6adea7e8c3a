//! Per-kind transforms over the preferences document.
//!
//! Every reducer has the same shape: find the last valid item of its kind
//! (optionally filtered by a key), merge the caller's change onto it or start
//! from defaults, drop every item of that kind (or key), and append the
//! single result. Reducers are pure. They return an [`Update`] so they plug
//! straight into [`crate::coordinator::UpdateCoordinator::update`].
//!
//! Anything built locally is validated before it is returned. A validation
//! failure aborts the whole cycle; nothing is written.

pub mod app_state;
pub mod hidden_posts;
pub mod moderation;
pub mod muted_words;
pub mod views;

use crate::coordinator::Update;
use crate::error::PrefsError;
use crate::model::validate::Validate;
use crate::model::{PreferenceItem, PreferenceKind, replace_kind};

pub use app_state::{dismiss_nudges, queue_nudges, set_active_progress_guide};
pub use hidden_posts::{hide_post, unhide_post};
pub use moderation::{
    LEGACY_LABEL_ALIASES, add_labeler, labeler_dids, legacy_alias_of, remove_labeler,
    set_adult_content_enabled, set_content_label_pref,
};
pub use muted_words::{
    add_muted_word, add_muted_words, remove_muted_word, remove_muted_words, update_muted_word,
};
pub use views::{set_feed_view_prefs, set_interests_pref, set_personal_details, set_thread_view_prefs};

/// Validate `payload`, then replace every item of `kind` with it.
fn replace_validated<T: Validate>(
    items: Vec<PreferenceItem>,
    kind: PreferenceKind,
    payload: T,
    wrap: impl FnOnce(T) -> PreferenceItem,
) -> Result<Update, PrefsError> {
    payload.validate()?;
    Ok(Update::Replace(replace_kind(items, kind, wrap(payload))))
}
