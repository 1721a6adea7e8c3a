//! Muted words.
//!
//! Every pass that rewrites the muted-words item also gives an id to each
//! word still missing one, so identity by id takes over as documents are
//! touched.

use std::collections::BTreeMap;

use super::replace_validated;
use crate::coordinator::Update;
use crate::error::PrefsError;
use crate::model::muted::sanitize_muted_word_value;
use crate::model::validate::Validate;
use crate::model::{MutedWord, MutedWordsPref, PreferenceItem, PreferenceKind, last_muted_words};
use crate::tid::Tid;

fn backfill_ids(words: &mut [MutedWord]) {
    for word in words.iter_mut().filter(|word| word.id.is_none()) {
        word.id = Some(Tid::next_str());
    }
}

fn commit(items: Vec<PreferenceItem>, mut pref: MutedWordsPref) -> Result<Update, PrefsError> {
    backfill_ids(&mut pref.items);
    replace_validated(
        items,
        PreferenceKind::MutedWords,
        pref,
        PreferenceItem::MutedWords,
    )
}

/// Append one word with a fresh id.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if the merged item is malformed.
pub fn add_muted_word(items: Vec<PreferenceItem>, word: MutedWord) -> Result<Update, PrefsError> {
    add_muted_words(items, vec![word])
}

/// Append new words with fresh ids. Words that sanitize to nothing are
/// skipped; if none remain the document is left alone.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if the merged item is malformed.
pub fn add_muted_words(
    items: Vec<PreferenceItem>,
    words: Vec<MutedWord>,
) -> Result<Update, PrefsError> {
    let fresh: Vec<MutedWord> = words
        .into_iter()
        .filter_map(|word| {
            let value = sanitize_muted_word_value(&word.value);
            (!value.is_empty()).then(|| MutedWord {
                id: Some(Tid::next_str()),
                value,
                ..word
            })
        })
        .collect();
    if fresh.is_empty() {
        return Ok(Update::Unchanged);
    }
    fresh.iter().try_for_each(Validate::validate)?;

    let mut pref = last_muted_words(&items).cloned().unwrap_or_default();
    pref.items.extend(fresh);
    commit(items, pref)
}

/// Replace the fields of every word matching `word` by identity.
///
/// The existing id is kept (or minted); value, targets, actors and expiry
/// come from `word`.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if the updated word is malformed.
pub fn update_muted_word(items: Vec<PreferenceItem>, word: &MutedWord) -> Result<Update, PrefsError> {
    let Some(mut pref) = last_muted_words(&items).cloned() else {
        return Ok(Update::Unchanged);
    };
    for existing in &mut pref.items {
        if existing.is_same_word(word) {
            let mut extra: BTreeMap<_, _> = std::mem::take(&mut existing.extra);
            extra.extend(word.extra.clone());
            *existing = MutedWord {
                id: existing.id.take().or_else(|| Some(Tid::next_str())),
                value: sanitize_muted_word_value(&word.value),
                targets: word.targets.clone(),
                actors: word.actors.clone(),
                expires_at: word.expires_at,
                extra,
            };
        }
    }
    commit(items, pref)
}

/// # Errors
///
/// As [`remove_muted_words`].
pub fn remove_muted_word(items: Vec<PreferenceItem>, word: &MutedWord) -> Result<Update, PrefsError> {
    remove_muted_words(items, std::slice::from_ref(word))
}

/// Remove the first word matching each of `words`.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if a remaining word is malformed.
pub fn remove_muted_words(
    items: Vec<PreferenceItem>,
    words: &[MutedWord],
) -> Result<Update, PrefsError> {
    let Some(mut pref) = last_muted_words(&items).cloned() else {
        return Ok(Update::Unchanged);
    };
    for word in words {
        if let Some(index) = pref.items.iter().position(|existing| existing.is_same_word(word)) {
            pref.items.remove(index);
        }
    }
    commit(items, pref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MutedWordTarget;

    fn replaced(update: Result<Update, PrefsError>) -> Vec<PreferenceItem> {
        match update.expect("reducer succeeds") {
            Update::Replace(items) => items,
            Update::Unchanged => panic!("expected a replacement"),
        }
    }

    fn words(items: &[PreferenceItem]) -> Vec<MutedWord> {
        last_muted_words(items)
            .map(|pref| pref.items.clone())
            .unwrap_or_default()
    }

    fn legacy(value: &str) -> PreferenceItem {
        PreferenceItem::MutedWords(MutedWordsPref {
            items: vec![MutedWord::new(value, vec![MutedWordTarget::Content])],
            ..MutedWordsPref::default()
        })
    }

    #[test]
    fn add_sanitizes_and_assigns_ids() {
        let items = replaced(add_muted_word(
            Vec::new(),
            MutedWord::new("  #spoilers\n", vec![MutedWordTarget::Tag]),
        ));
        let stored = words(&items);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, "spoilers");
        assert!(stored[0].id.as_deref().is_some_and(Tid::is_valid));
    }

    #[test]
    fn empty_after_sanitize_is_a_no_op() {
        let update = add_muted_word(Vec::new(), MutedWord::new(" # ", vec![])).expect("ok");
        assert_eq!(update, Update::Unchanged);
    }

    #[test]
    fn any_pass_backfills_legacy_ids() {
        let items = replaced(add_muted_word(
            vec![legacy("old")],
            MutedWord::new("new", vec![MutedWordTarget::Content]),
        ));
        assert!(words(&items).iter().all(|w| w.id.is_some()));
    }

    #[test]
    fn update_matches_legacy_word_by_value_and_mints_id() {
        let mut replacement = MutedWord::new("old", vec![MutedWordTarget::Tag]);
        replacement.actors = vec!["did:plc:bob".into()];
        let items = replaced(update_muted_word(vec![legacy("old")], &replacement));
        let stored = words(&items);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].targets, vec![MutedWordTarget::Tag]);
        assert_eq!(stored[0].actors, vec!["did:plc:bob".to_string()]);
        assert!(stored[0].id.is_some());
    }

    #[test]
    fn update_by_id_can_rename() {
        let items = replaced(add_muted_word(Vec::new(), MutedWord::new("foo", vec![])));
        let mut renamed = words(&items)[0].clone();
        renamed.value = "bar".into();
        let items = replaced(update_muted_word(items, &renamed));
        let stored = words(&items);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, "bar");
        assert_eq!(stored[0].id, renamed.id);
    }

    #[test]
    fn remove_by_value_only_touches_legacy_words() {
        let items = replaced(add_muted_word(Vec::new(), MutedWord::new("foo", vec![])));
        let mut stored = words(&items);
        stored.push(MutedWord::new("foo", vec![]));
        let items = vec![PreferenceItem::MutedWords(MutedWordsPref {
            items: stored,
            ..MutedWordsPref::default()
        })];

        let items = replaced(remove_muted_word(items, &MutedWord::new("foo", vec![])));
        let remaining = words(&items);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].value, "foo");
    }

    #[test]
    fn missing_item_leaves_document_alone() {
        let update = remove_muted_words(Vec::new(), &[MutedWord::new("foo", vec![])]).expect("ok");
        assert_eq!(update, Update::Unchanged);
    }

    #[test]
    fn invalid_actor_aborts_add() {
        let mut word = MutedWord::new("foo", vec![]);
        word.actors = vec!["bob".into()];
        assert!(add_muted_word(Vec::new(), word).is_err());
    }
}
