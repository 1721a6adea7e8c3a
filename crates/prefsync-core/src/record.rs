//! Compare-and-swap updates of single named records.
//!
//! Writers of these records may live in other processes, so there is no
//! local lock on this path. Each attempt reads the record and its content
//! id, applies the caller's update, validates the result, and writes it
//! guarded by the id it read. A lost race starts the cycle over, up to the
//! configured retry bound.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PrefsError;
use crate::model::validate::{Validate, ValidationError, ValidationScope, check_length};
use crate::store::{RecordStore, StoreError};

/// Retries after the first attempt, unless configured otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// A record type stored at a fixed `(collection, rkey)` per owner.
pub trait RecordDocument: Serialize + DeserializeOwned + Validate + Send {
    const COLLECTION: &'static str;
    const RKEY: &'static str;
}

const PROFILE_COLLECTION: &str = "app.bsky.actor.profile";
const MAX_DISPLAY_NAME_CHARS: usize = 64;
const MAX_DISPLAY_NAME_BYTES: usize = 640;
const MAX_DESCRIPTION_CHARS: usize = 256;
const MAX_DESCRIPTION_BYTES: usize = 2_560;

/// The account profile record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[serde(rename = "$type", default = "ProfileRecord::type_tag")]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Blob reference, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProfileRecord {
    fn type_tag() -> String {
        PROFILE_COLLECTION.to_string()
    }
}

impl Default for ProfileRecord {
    fn default() -> Self {
        Self {
            record_type: Self::type_tag(),
            display_name: None,
            description: None,
            avatar: None,
            banner: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Validate for ProfileRecord {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.record_type != PROFILE_COLLECTION {
            return Err(ValidationError::record(
                "$type",
                format!("expected {PROFILE_COLLECTION}, got {}", self.record_type),
            ));
        }
        if let Some(name) = &self.display_name {
            check_length(
                ValidationScope::Record,
                "displayName",
                name,
                MAX_DISPLAY_NAME_BYTES,
                MAX_DISPLAY_NAME_CHARS,
            )?;
        }
        if let Some(description) = &self.description {
            check_length(
                ValidationScope::Record,
                "description",
                description,
                MAX_DESCRIPTION_BYTES,
                MAX_DESCRIPTION_CHARS,
            )?;
        }
        Ok(())
    }
}

impl RecordDocument for ProfileRecord {
    const COLLECTION: &'static str = PROFILE_COLLECTION;
    const RKEY: &'static str = "self";
}

/// Bounded CAS loop over a [`RecordStore`].
pub struct RecordUpdater {
    store: Arc<dyn RecordStore>,
    max_retries: u32,
}

impl RecordUpdater {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Read, update, validate and conditionally write `R` for `owner`.
    ///
    /// `update` receives the current record, or `None` if there is none yet,
    /// and may run once per attempt.
    ///
    /// # Errors
    ///
    /// - [`PrefsError::Validation`] if the produced record is malformed.
    /// - [`PrefsError::Conflict`] once `max_retries + 1` attempts have all
    ///   lost to concurrent writers.
    /// - [`PrefsError::Store`] for any other store failure, without retry.
    pub async fn upsert<R, F>(&self, owner: &str, mut update: F) -> Result<R, PrefsError>
    where
        R: RecordDocument,
        F: FnMut(Option<R>) -> Result<R, PrefsError> + Send,
    {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;

            let stored = self.store.fetch_record(owner, R::COLLECTION, R::RKEY).await?;
            let (current, swap) = match stored {
                Some(record) => (Some(serde_json::from_value::<R>(record.value)?), Some(record.cid)),
                None => (None, None),
            };

            let next = update(current)?;
            next.validate()?;
            let value = serde_json::to_value(&next)?;

            match self
                .store
                .put_record(owner, R::COLLECTION, R::RKEY, value, swap)
                .await
            {
                Ok(cid) => {
                    debug!(collection = R::COLLECTION, attempt, %cid, "record written");
                    return Ok(next);
                }
                Err(StoreError::Conflict { .. }) if attempt < max_attempts => {
                    warn!(
                        collection = R::COLLECTION,
                        attempt, max_attempts, "record changed underneath us, retrying"
                    );
                }
                Err(StoreError::Conflict { .. }) => {
                    warn!(collection = R::COLLECTION, attempts = attempt, "giving up on record write");
                    return Err(PrefsError::Conflict { attempts: attempt });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl std::fmt::Debug for RecordUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordUpdater")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    const OWNER: &str = "did:plc:alice";

    fn rename(name: &'static str) -> impl FnMut(Option<ProfileRecord>) -> Result<ProfileRecord, PrefsError> + Send {
        move |existing| {
            let mut profile = existing.unwrap_or_default();
            profile.display_name = Some(name.to_string());
            Ok(profile)
        }
    }

    #[tokio::test]
    async fn creates_then_updates() {
        let store = Arc::new(MemoryStore::new());
        let updater = RecordUpdater::new(store.clone(), DEFAULT_MAX_RETRIES);
        updater.upsert(OWNER, rename("Alice")).await.expect("create");
        let profile = updater.upsert(OWNER, rename("Alice B")).await.expect("update");
        assert_eq!(profile.display_name.as_deref(), Some("Alice B"));

        let stored = store
            .record(OWNER, ProfileRecord::COLLECTION, ProfileRecord::RKEY)
            .expect("stored");
        assert_eq!(stored.value["$type"], PROFILE_COLLECTION);
        assert_eq!(stored.value["displayName"], "Alice B");
    }

    #[tokio::test]
    async fn unknown_fields_survive() {
        let store = Arc::new(MemoryStore::new());
        let _cid = store.seed_record(
            OWNER,
            ProfileRecord::COLLECTION,
            ProfileRecord::RKEY,
            json!({"$type": PROFILE_COLLECTION, "pronouns": "they/them", "description": "hi"}),
        );
        let updater = RecordUpdater::new(store.clone(), DEFAULT_MAX_RETRIES);
        updater.upsert(OWNER, rename("Sam")).await.expect("update");
        let stored = store
            .record(OWNER, ProfileRecord::COLLECTION, ProfileRecord::RKEY)
            .expect("stored");
        assert_eq!(stored.value["pronouns"], "they/them");
        assert_eq!(stored.value["description"], "hi");
    }

    #[tokio::test]
    async fn validation_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let updater = RecordUpdater::new(store.clone(), DEFAULT_MAX_RETRIES);
        let err = updater
            .upsert(OWNER, |_: Option<ProfileRecord>| {
                Ok(ProfileRecord {
                    display_name: Some("x".repeat(65)),
                    ..ProfileRecord::default()
                })
            })
            .await
            .expect_err("too long");
        assert!(matches!(err, PrefsError::Validation(_)));
        assert_eq!(store.record_put_count(), 0);
    }

    #[tokio::test]
    async fn transport_errors_are_not_retried() {
        let store = Arc::new(MemoryStore::new());
        store.set_transport_failure(true);
        let updater = RecordUpdater::new(store.clone(), DEFAULT_MAX_RETRIES);
        let err = updater.upsert(OWNER, rename("x")).await.expect_err("transport");
        assert!(matches!(err, PrefsError::Store(StoreError::Transport(_))));
    }

    #[test]
    fn description_limits_count_chars_and_bytes() {
        let ok = ProfileRecord {
            description: Some("é".repeat(256)),
            ..ProfileRecord::default()
        };
        assert!(ok.validate().is_ok());
        let too_many = ProfileRecord {
            description: Some("a".repeat(257)),
            ..ProfileRecord::default()
        };
        assert!(too_many.validate().is_err());
    }
}
