use super::replace_validated;
use crate::coordinator::Update;
use crate::error::PrefsError;
use crate::model::{HiddenPostsPref, PreferenceItem, PreferenceKind, last_hidden_posts};
use crate::syntax::AtUri;

fn dedup(uris: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(uris.len());
    for uri in uris {
        if !out.contains(&uri) {
            out.push(uri);
        }
    }
    out
}

/// Add `post_uri` to the hidden set.
///
/// # Errors
///
/// Returns [`PrefsError::Validation`] if `post_uri` is not an AT-URI.
pub fn hide_post(items: Vec<PreferenceItem>, post_uri: &str) -> Result<Update, PrefsError> {
    post_uri.parse::<AtUri>()?;
    let mut pref = last_hidden_posts(&items).cloned().unwrap_or_default();
    pref.items.push(post_uri.to_string());
    pref.items = dedup(std::mem::take(&mut pref.items));
    replace_validated(items, PreferenceKind::HiddenPosts, pref, PreferenceItem::HiddenPosts)
}

/// # Errors
///
/// Returns [`PrefsError::Validation`] if the merged item is malformed.
pub fn unhide_post(items: Vec<PreferenceItem>, post_uri: &str) -> Result<Update, PrefsError> {
    let Some(existing) = last_hidden_posts(&items) else {
        return Ok(Update::Unchanged);
    };
    let pref = HiddenPostsPref {
        items: dedup(
            existing
                .items
                .iter()
                .filter(|uri| *uri != post_uri)
                .cloned()
                .collect(),
        ),
        extra: existing.extra.clone(),
    };
    replace_validated(items, PreferenceKind::HiddenPosts, pref, PreferenceItem::HiddenPosts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST: &str = "at://did:plc:alice/app.bsky.feed.post/3k";
    const OTHER: &str = "at://did:plc:alice/app.bsky.feed.post/3m";

    fn hidden(update: Result<Update, PrefsError>) -> Vec<PreferenceItem> {
        match update.expect("reducer succeeds") {
            Update::Replace(items) => items,
            Update::Unchanged => panic!("expected a replacement"),
        }
    }

    #[test]
    fn hide_is_a_set_insert() {
        let items = hidden(hide_post(Vec::new(), POST));
        let items = hidden(hide_post(items, POST));
        let items = hidden(hide_post(items, OTHER));
        let pref = last_hidden_posts(&items).expect("present");
        assert_eq!(pref.items, vec![POST.to_string(), OTHER.to_string()]);
    }

    #[test]
    fn unhide_filters_and_keeps_other_kinds() {
        let mut items = hidden(hide_post(Vec::new(), POST));
        items.insert(
            0,
            PreferenceItem::Interests(crate::model::InterestsPref {
                tags: vec!["cats".into()],
                ..Default::default()
            }),
        );
        let items = hidden(unhide_post(items, POST));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind(), Some(PreferenceKind::Interests));
        assert!(last_hidden_posts(&items).expect("present").items.is_empty());
    }

    #[test]
    fn unhide_without_item_is_a_no_op() {
        assert_eq!(unhide_post(Vec::new(), POST).expect("ok"), Update::Unchanged);
    }

    #[test]
    fn hide_rejects_non_uri() {
        assert!(hide_post(Vec::new(), "https://example.com").is_err());
    }
}
