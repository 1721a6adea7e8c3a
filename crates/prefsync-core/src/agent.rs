//! The client-facing facade.
//!
//! Each semantic operation runs one reducer through the coordinator, so calls
//! issued concurrently on one agent queue up instead of overwriting each
//! other. Inputs that can be checked without the document are checked before
//! the cycle starts, so a malformed request never reaches the store.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::AgentConfig;
use crate::coordinator::{Update, UpdateCoordinator};
use crate::error::PrefsError;
use crate::labelers::{LabelerSource, get_label_definitions};
use crate::model::validate::Validate;
use crate::model::{
    FeedViewPatch, InterestsPatch, LabelVisibility, MutedWord, PreferenceItem, ProgressGuide,
    SavedFeed, ThreadViewPatch, last_saved_feeds_v2,
};
use crate::record::{ProfileRecord, RecordUpdater};
use crate::reducers;
use crate::saved_feeds::{self, SavedFeedDraft};
use crate::store::{LabelValueDefinition, LabelerService, PreferenceStore, RecordStore};
use crate::syntax::ensure_valid_did;
use crate::view::Preferences;

pub struct PreferencesAgent {
    coordinator: UpdateCoordinator,
    records: RecordUpdater,
    labeler_service: Arc<dyn LabelerService>,
    config: AgentConfig,
    session_did: Option<String>,
    configured_labelers: RwLock<Vec<String>>,
}

impl PreferencesAgent {
    /// An agent over one backend that serves every store contract.
    #[must_use]
    pub fn new<S>(store: Arc<S>, config: AgentConfig) -> Self
    where
        S: PreferenceStore + RecordStore + LabelerService + 'static,
    {
        Self::from_parts(store.clone(), store.clone(), store, config)
    }

    #[must_use]
    pub fn from_parts(
        preferences: Arc<dyn PreferenceStore>,
        records: Arc<dyn RecordStore>,
        labeler_service: Arc<dyn LabelerService>,
        config: AgentConfig,
    ) -> Self {
        Self {
            coordinator: UpdateCoordinator::new(preferences),
            records: RecordUpdater::new(records, config.record_max_retries),
            labeler_service,
            config,
            session_did: None,
            configured_labelers: RwLock::new(Vec::new()),
        }
    }

    /// Attach the owner identity used by record writes.
    #[must_use]
    pub fn with_session(mut self, did: impl Into<String>) -> Self {
        self.session_did = Some(did.into());
        self
    }

    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Labeler dids from the most recently seen document.
    #[must_use]
    pub fn configured_labelers(&self) -> Vec<String> {
        self.configured_labelers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn configure_labelers(&self, items: &[PreferenceItem]) {
        let dids = reducers::labeler_dids(items);
        let mut configured = self
            .configured_labelers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if *configured != dids {
            info!(labelers = ?dids, "configured labelers changed");
            *configured = dids;
        }
    }

    async fn update<F>(&self, transform: F) -> Result<Vec<PreferenceItem>, PrefsError>
    where
        F: FnOnce(Vec<PreferenceItem>) -> Result<Update, PrefsError> + Send,
    {
        self.coordinator.update(transform).await
    }

    // -- read side ---------------------------------------------------------

    /// Read the document, migrating legacy saved feeds first if needed.
    ///
    /// # Errors
    ///
    /// Store failures, or a validation failure in the migration.
    pub async fn get_preferences(&self) -> Result<Preferences, PrefsError> {
        let mut items = self.coordinator.store().fetch_preferences().await?;
        if last_saved_feeds_v2(&items).is_none() {
            items = self.update(saved_feeds::migrate_saved_feeds).await?;
        }
        self.configure_labelers(&items);
        Ok(Preferences::from_items(&items, &self.config.app_labelers))
    }

    /// Label value definitions for the app labelers plus `source`'s.
    ///
    /// # Errors
    ///
    /// Store failures from the labeler service.
    pub async fn get_label_definitions(
        &self,
        source: LabelerSource<'_>,
    ) -> Result<BTreeMap<String, Vec<LabelValueDefinition>>, PrefsError> {
        get_label_definitions(
            self.labeler_service.as_ref(),
            &self.config.app_labelers,
            source,
        )
        .await
    }

    // -- saved feeds -------------------------------------------------------

    fn saved_feeds_of(items: &[PreferenceItem]) -> Vec<SavedFeed> {
        last_saved_feeds_v2(items)
            .map(|pref| pref.items.clone())
            .unwrap_or_default()
    }

    /// Replace the saved-feeds list; returns the list as stored.
    ///
    /// # Errors
    ///
    /// A validation error for an entry without a TID id or with a value outside
    /// its type's collection, before the store is contacted. Otherwise store
    /// failures.
    pub async fn overwrite_saved_feeds(
        &self,
        feeds: Vec<SavedFeed>,
    ) -> Result<Vec<SavedFeed>, PrefsError> {
        saved_feeds::check_entries(&feeds)?;
        let items = self
            .update(move |items| saved_feeds::overwrite_saved_feeds(items, feeds))
            .await?;
        Ok(Self::saved_feeds_of(&items))
    }

    /// Only the `pinned` flag of each entry is applied.
    ///
    /// # Errors
    ///
    /// As [`Self::overwrite_saved_feeds`].
    pub async fn update_saved_feeds(
        &self,
        updates: Vec<SavedFeed>,
    ) -> Result<Vec<SavedFeed>, PrefsError> {
        saved_feeds::check_entries(&updates)?;
        let items = self
            .update(move |items| saved_feeds::update_saved_feeds(items, &updates))
            .await?;
        Ok(Self::saved_feeds_of(&items))
    }

    /// Add entries with fresh ids; returns the entries as added.
    ///
    /// # Errors
    ///
    /// As [`Self::overwrite_saved_feeds`].
    pub async fn add_saved_feeds(
        &self,
        drafts: Vec<SavedFeedDraft>,
    ) -> Result<Vec<SavedFeed>, PrefsError> {
        let added: Vec<SavedFeed> = drafts.into_iter().map(SavedFeedDraft::into_saved_feed).collect();
        saved_feeds::check_entries(&added)?;
        let to_add = added.clone();
        self.update(move |items| saved_feeds::add_saved_feeds(items, to_add))
            .await?;
        Ok(added)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn remove_saved_feeds(&self, ids: Vec<String>) -> Result<Vec<SavedFeed>, PrefsError> {
        let items = self
            .update(move |items| saved_feeds::remove_saved_feeds(items, &ids))
            .await?;
        Ok(Self::saved_feeds_of(&items))
    }

    // -- moderation --------------------------------------------------------

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn set_adult_content_enabled(&self, enabled: bool) -> Result<(), PrefsError> {
        self.update(move |items| reducers::set_adult_content_enabled(items, enabled))
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// A malformed labeler did fails before the store is contacted; otherwise
    /// store failures.
    pub async fn set_content_label_pref(
        &self,
        label: &str,
        visibility: LabelVisibility,
        labeler_did: Option<&str>,
    ) -> Result<(), PrefsError> {
        if let Some(did) = labeler_did {
            ensure_valid_did(did)?;
        }
        let label = label.to_string();
        let labeler_did = labeler_did.map(str::to_string);
        self.update(move |items| {
            reducers::set_content_label_pref(items, &label, visibility, labeler_did.as_deref())
        })
        .await
        .map(drop)
    }

    /// Subscribe to a labeler and refresh the configured set.
    ///
    /// # Errors
    ///
    /// A malformed did fails before the store is contacted; otherwise store
    /// failures.
    pub async fn add_labeler(&self, did: &str) -> Result<(), PrefsError> {
        ensure_valid_did(did)?;
        let did = did.to_string();
        let items = self
            .update(move |items| reducers::add_labeler(items, &did))
            .await?;
        self.configure_labelers(&items);
        Ok(())
    }

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn remove_labeler(&self, did: &str) -> Result<(), PrefsError> {
        let did = did.to_string();
        let items = self
            .update(move |items| reducers::remove_labeler(items, &did))
            .await?;
        self.configure_labelers(&items);
        Ok(())
    }

    // -- muted words -------------------------------------------------------

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn add_muted_word(&self, word: MutedWord) -> Result<(), PrefsError> {
        self.update(move |items| reducers::add_muted_word(items, word))
            .await
            .map(drop)
    }

    /// Add several words in one cycle.
    ///
    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn add_muted_words(&self, words: Vec<MutedWord>) -> Result<(), PrefsError> {
        self.update(move |items| reducers::add_muted_words(items, words))
            .await
            .map(drop)
    }

    /// Update the stored word `word` identifies.
    ///
    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn update_muted_word(&self, word: MutedWord) -> Result<(), PrefsError> {
        self.update(move |items| reducers::update_muted_word(items, &word))
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn remove_muted_word(&self, word: MutedWord) -> Result<(), PrefsError> {
        self.update(move |items| reducers::remove_muted_word(items, &word))
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn remove_muted_words(&self, words: Vec<MutedWord>) -> Result<(), PrefsError> {
        self.update(move |items| reducers::remove_muted_words(items, &words))
            .await
            .map(drop)
    }

    // -- hidden posts ------------------------------------------------------

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn hide_post(&self, post_uri: &str) -> Result<(), PrefsError> {
        let uri = post_uri.to_string();
        self.update(move |items| reducers::hide_post(items, &uri))
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn unhide_post(&self, post_uri: &str) -> Result<(), PrefsError> {
        let uri = post_uri.to_string();
        self.update(move |items| reducers::unhide_post(items, &uri))
            .await
            .map(drop)
    }

    // -- personal details and views ----------------------------------------

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn set_personal_details(
        &self,
        birth_date: Option<DateTime<Utc>>,
    ) -> Result<(), PrefsError> {
        self.update(move |items| reducers::set_personal_details(items, birth_date))
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn set_feed_view_prefs(
        &self,
        feed: &str,
        patch: FeedViewPatch,
    ) -> Result<(), PrefsError> {
        let feed = feed.to_string();
        self.update(move |items| reducers::set_feed_view_prefs(items, &feed, patch))
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn set_thread_view_prefs(&self, patch: ThreadViewPatch) -> Result<(), PrefsError> {
        self.update(move |items| reducers::set_thread_view_prefs(items, patch))
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn set_interests_pref(&self, patch: InterestsPatch) -> Result<(), PrefsError> {
        self.update(move |items| reducers::set_interests_pref(items, patch))
            .await
            .map(drop)
    }

    // -- app state ---------------------------------------------------------

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn queue_nudges(&self, nudges: Vec<String>) -> Result<(), PrefsError> {
        self.update(move |items| reducers::queue_nudges(items, &nudges))
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Store failures, or [`PrefsError::Validation`] from the reducer.
    pub async fn dismiss_nudges(&self, nudges: Vec<String>) -> Result<(), PrefsError> {
        self.update(move |items| reducers::dismiss_nudges(items, &nudges))
            .await
            .map(drop)
    }

    /// Set or clear the active progress guide. A malformed guide is rejected
    /// before the store is contacted.
    ///
    /// # Errors
    ///
    /// A malformed guide fails up front; otherwise store failures.
    pub async fn set_active_progress_guide(
        &self,
        guide: Option<ProgressGuide>,
    ) -> Result<(), PrefsError> {
        if let Some(guide) = &guide {
            guide.validate()?;
        }
        self.update(move |items| reducers::set_active_progress_guide(items, guide))
            .await
            .map(drop)
    }

    // -- records -----------------------------------------------------------

    /// Read-modify-write the session owner's profile record.
    ///
    /// # Errors
    ///
    /// [`PrefsError::NotAuthenticated`] without a session, before any store
    /// call; otherwise as [`RecordUpdater::upsert`].
    pub async fn upsert_profile<F>(&self, update: F) -> Result<ProfileRecord, PrefsError>
    where
        F: FnMut(Option<ProfileRecord>) -> Result<ProfileRecord, PrefsError> + Send,
    {
        let owner = self
            .session_did
            .as_deref()
            .ok_or(PrefsError::NotAuthenticated)?;
        self.records.upsert(owner, update).await
    }
}

impl std::fmt::Debug for PreferencesAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferencesAgent")
            .field("session_did", &self.session_did)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
