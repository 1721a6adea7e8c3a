//! Fan-out to labeler services for their label value definitions.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::PrefsError;
use crate::store::{LabelValueDefinition, LabelerService};
use crate::view::Preferences;

/// Where the account's labeler list comes from.
#[derive(Debug, Clone, Copy)]
pub enum LabelerSource<'a> {
    Preferences(&'a Preferences),
    Dids(&'a [String]),
}

/// App labelers followed by the source's labelers, without repeats.
#[must_use]
pub fn request_dids(app_labelers: &[String], source: LabelerSource<'_>) -> Vec<String> {
    let configured = match source {
        LabelerSource::Preferences(prefs) => prefs.labeler_dids(),
        LabelerSource::Dids(dids) => dids.to_vec(),
    };
    let mut dids: Vec<String> = Vec::with_capacity(app_labelers.len() + configured.len());
    for did in app_labelers.iter().cloned().chain(configured) {
        if !dids.contains(&did) {
            dids.push(did);
        }
    }
    dids
}

/// Fetch detailed labeler views and key their definitions by creator.
///
/// # Errors
///
/// Store failures are passed through unchanged.
pub async fn get_label_definitions(
    service: &dyn LabelerService,
    app_labelers: &[String],
    source: LabelerSource<'_>,
) -> Result<BTreeMap<String, Vec<LabelValueDefinition>>, PrefsError> {
    let dids = request_dids(app_labelers, source);
    let views = service.fetch_labeler_definitions(&dids, true).await?;
    debug!(requested = dids.len(), returned = views.len(), "fetched labeler definitions");
    Ok(views
        .into_iter()
        .map(|view| (view.creator_did, view.label_value_definitions))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::LabelerView;

    fn definition(identifier: &str) -> LabelValueDefinition {
        LabelValueDefinition {
            identifier: identifier.to_string(),
            severity: "alert".into(),
            blurs: "content".into(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn app_labelers_come_first_without_duplicates() {
        let app = vec!["did:plc:app".to_string()];
        let configured = vec!["did:plc:mod".to_string(), "did:plc:app".to_string()];
        assert_eq!(
            request_dids(&app, LabelerSource::Dids(&configured)),
            vec!["did:plc:app".to_string(), "did:plc:mod".to_string()]
        );
    }

    #[tokio::test]
    async fn maps_creator_to_definitions() {
        let store = MemoryStore::new();
        store.set_labelers(vec![
            LabelerView {
                creator_did: "did:plc:app".into(),
                label_value_definitions: vec![definition("spam")],
            },
            LabelerView {
                creator_did: "did:plc:unrelated".into(),
                label_value_definitions: vec![definition("rude")],
            },
        ]);
        let app = vec!["did:plc:app".to_string()];
        let defs = get_label_definitions(&store, &app, LabelerSource::Dids(&[]))
            .await
            .expect("fetch");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs["did:plc:app"][0].identifier, "spam");
        assert_eq!(store.labeler_requests(), vec![app]);
    }
}
