//! In-process store used by tests and the simulator.
//!
//! The preferences document is held in its wire form, so every fetch goes
//! through the same decode path a real transport would. Records are keyed by
//! `(owner, collection, rkey)` and carry a content id that is the BLAKE3 hash
//! of their canonical JSON encoding.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::model::{PreferenceItem, decode_document, encode_document};
use crate::store::{
    LabelerService, LabelerView, PreferenceStore, RecordStore, StoreError, StoredRecord,
};

type RecordKey = (String, String, String);

#[derive(Debug, Default)]
struct State {
    preferences: Vec<Value>,
    records: HashMap<RecordKey, StoredRecord>,
    labelers: Vec<LabelerView>,
    fetch_delays: VecDeque<Duration>,
    rival_writers: u32,
    fail_transport: bool,
    fetches: u64,
    commits: u64,
    record_puts: u64,
    labeler_requests: Vec<Vec<String>>,
}

/// Shared in-memory implementation of every store contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fetch_latency: Duration,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every preferences fetch.
    #[must_use]
    pub fn with_fetch_latency(mut self, latency: Duration) -> Self {
        self.fetch_latency = latency;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue per-fetch delays; each fetch pops one before falling back to the
    /// fixed latency.
    pub fn push_fetch_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.state().fetch_delays.extend(delays);
    }

    /// Replace the stored document with raw wire items.
    pub fn seed_raw_preferences(&self, raw: Vec<Value>) {
        self.state().preferences = raw;
    }

    /// The stored document in wire form.
    #[must_use]
    pub fn raw_preferences(&self) -> Vec<Value> {
        self.state().preferences.clone()
    }

    /// The stored document, decoded.
    #[must_use]
    pub fn preferences(&self) -> Vec<PreferenceItem> {
        decode_document(self.raw_preferences())
    }

    /// Make the next `count` record writes lose to a concurrent writer.
    pub fn inject_rival_writers(&self, count: u32) {
        self.state().rival_writers = count;
    }

    /// While set, every call fails with a transport error.
    pub fn set_transport_failure(&self, failing: bool) {
        self.state().fail_transport = failing;
    }

    pub fn set_labelers(&self, labelers: Vec<LabelerView>) {
        self.state().labelers = labelers;
    }

    /// Seed a record directly, bypassing the swap check. Returns its content id.
    #[must_use]
    pub fn seed_record(&self, owner: &str, collection: &str, rkey: &str, value: Value) -> String {
        let cid = content_id(&value);
        self.state().records.insert(
            record_key(owner, collection, rkey),
            StoredRecord {
                value,
                cid: cid.clone(),
            },
        );
        cid
    }

    #[must_use]
    pub fn record(&self, owner: &str, collection: &str, rkey: &str) -> Option<StoredRecord> {
        self.state()
            .records
            .get(&record_key(owner, collection, rkey))
            .cloned()
    }

    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.state().fetches
    }

    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.state().commits
    }

    /// Record writes attempted, rejected ones included.
    #[must_use]
    pub fn record_put_count(&self) -> u64 {
        self.state().record_puts
    }

    /// The did lists passed to each labeler lookup, in call order.
    #[must_use]
    pub fn labeler_requests(&self) -> Vec<Vec<String>> {
        self.state().labeler_requests.clone()
    }

    fn check_transport(state: &State, op: &str) -> Result<(), StoreError> {
        if state.fail_transport {
            return Err(StoreError::Transport(anyhow::anyhow!(
                "memory store: injected failure during {op}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn fetch_preferences(&self) -> Result<Vec<PreferenceItem>, StoreError> {
        // The snapshot is taken when the request is issued; the delay models
        // the response still being in flight.
        let (snapshot, delay) = {
            let mut state = self.state();
            Self::check_transport(&state, "fetch")?;
            state.fetches += 1;
            let delay = state.fetch_delays.pop_front().unwrap_or(self.fetch_latency);
            (state.preferences.clone(), delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(decode_document(snapshot))
    }

    async fn commit_preferences(&self, items: Vec<PreferenceItem>) -> Result<(), StoreError> {
        let raw = encode_document(&items).map_err(|err| StoreError::Transport(err.into()))?;
        let mut state = self.state();
        Self::check_transport(&state, "commit")?;
        state.preferences = raw;
        state.commits += 1;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_record(
        &self,
        owner: &str,
        collection: &str,
        rkey: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let state = self.state();
        Self::check_transport(&state, "fetch_record")?;
        Ok(state
            .records
            .get(&record_key(owner, collection, rkey))
            .cloned())
    }

    async fn put_record(
        &self,
        owner: &str,
        collection: &str,
        rkey: &str,
        value: Value,
        swap: Option<String>,
    ) -> Result<String, StoreError> {
        let mut state = self.state();
        Self::check_transport(&state, "put_record")?;
        state.record_puts += 1;
        let key = record_key(owner, collection, rkey);

        if state.rival_writers > 0 {
            state.rival_writers -= 1;
            let generation = state.record_puts;
            let mut rival = state
                .records
                .get(&key)
                .map_or_else(|| json!({}), |record| record.value.clone());
            if let Value::Object(map) = &mut rival {
                map.insert("rivalWrite".to_string(), json!(generation));
            }
            let cid = content_id(&rival);
            state.records.insert(key.clone(), StoredRecord { value: rival, cid });
        }

        let current = state.records.get(&key).map(|record| record.cid.clone());
        if current != swap {
            return Err(StoreError::Conflict { expected: swap });
        }

        let cid = content_id(&value);
        state.records.insert(
            key,
            StoredRecord {
                value,
                cid: cid.clone(),
            },
        );
        Ok(cid)
    }
}

#[async_trait]
impl LabelerService for MemoryStore {
    async fn fetch_labeler_definitions(
        &self,
        dids: &[String],
        _detailed: bool,
    ) -> Result<Vec<LabelerView>, StoreError> {
        let mut state = self.state();
        Self::check_transport(&state, "fetch_labeler_definitions")?;
        state.labeler_requests.push(dids.to_vec());
        Ok(state
            .labelers
            .iter()
            .filter(|view| dids.contains(&view.creator_did))
            .cloned()
            .collect())
    }
}

fn record_key(owner: &str, collection: &str, rkey: &str) -> RecordKey {
    (owner.to_string(), collection.to_string(), rkey.to_string())
}

/// BLAKE3 of the canonical (sorted-key) JSON encoding.
#[must_use]
pub fn content_id(value: &Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "did:plc:alice";

    #[tokio::test]
    async fn put_without_swap_requires_absence() {
        let store = MemoryStore::new();
        let cid = store
            .put_record(OWNER, "c", "self", json!({"a": 1}), None)
            .await
            .expect("first create");
        let err = store
            .put_record(OWNER, "c", "self", json!({"a": 2}), None)
            .await
            .expect_err("second create must conflict");
        assert!(err.is_conflict());
        store
            .put_record(OWNER, "c", "self", json!({"a": 2}), Some(cid))
            .await
            .expect("swap with current cid");
    }

    #[tokio::test]
    async fn rival_writer_changes_cid_before_put() {
        let store = MemoryStore::new();
        let cid = store.seed_record(OWNER, "c", "self", json!({"a": 1}));
        store.inject_rival_writers(1);
        let err = store
            .put_record(OWNER, "c", "self", json!({"a": 2}), Some(cid.clone()))
            .await
            .expect_err("rival wins");
        assert!(err.is_conflict());
        let current = store.record(OWNER, "c", "self").expect("record exists");
        assert_ne!(current.cid, cid);
        assert_eq!(current.value["a"], 1);
    }

    #[test]
    fn content_id_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":2}"#).expect("json");
        let b: Value = serde_json::from_str(r#"{"y":2,"x":1}"#).expect("json");
        assert_eq!(content_id(&a), content_id(&b));
        assert_ne!(content_id(&a), content_id(&json!({"x": 2, "y": 2})));
    }

    #[tokio::test]
    async fn transport_failure_is_opaque() {
        let store = MemoryStore::new();
        store.set_transport_failure(true);
        let err = store.fetch_preferences().await.expect_err("injected");
        assert!(matches!(err, StoreError::Transport(_)));
        assert_eq!(store.commit_count(), 0);
    }
}
