//! Contracts for the remote collaborators.
//!
//! The core never talks to a network itself. A transport adapter implements
//! these traits; [`crate::memory::MemoryStore`] is the in-process one used by
//! tests and the simulator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::PreferenceItem;

/// Failure reported by a store collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A conditional write found a different content id than expected.
    #[error("conditional write rejected: expected content id {expected:?}")]
    Conflict { expected: Option<String> },

    /// Anything else. The core does not interpret it.
    #[error("store transport failure: {0}")]
    Transport(#[from] anyhow::Error),
}

impl StoreError {
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A named record together with the content id it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub value: Value,
    pub cid: String,
}

/// One label value definition published by a labeler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelValueDefinition {
    pub identifier: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub blurs: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A labeler service as returned by a detailed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelerView {
    pub creator_did: String,
    pub label_value_definitions: Vec<LabelValueDefinition>,
}

/// Holder of the preferences document.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// The current document, possibly holding duplicate, invalid, or legacy
    /// entries.
    ///
    /// # Errors
    ///
    /// [`StoreError::Transport`] when the document cannot be read.
    async fn fetch_preferences(&self) -> Result<Vec<PreferenceItem>, StoreError>;

    /// Overwrite the whole document.
    async fn commit_preferences(&self, items: Vec<PreferenceItem>) -> Result<(), StoreError>;
}

/// Holder of single named records with optimistic concurrency.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_record(
        &self,
        owner: &str,
        collection: &str,
        rkey: &str,
    ) -> Result<Option<StoredRecord>, StoreError>;

    /// Write `value` if the stored content id still equals `swap`
    /// (`None` means the record must not exist yet). Returns the new id.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] when the swap check fails; the caller decides
    /// whether to retry.
    async fn put_record(
        &self,
        owner: &str,
        collection: &str,
        rkey: &str,
        value: Value,
        swap: Option<String>,
    ) -> Result<String, StoreError>;
}

/// Lookup of labeler services and their published definitions.
#[async_trait]
pub trait LabelerService: Send + Sync {
    async fn fetch_labeler_definitions(
        &self,
        dids: &[String],
        detailed: bool,
    ) -> Result<Vec<LabelerView>, StoreError>;
}
