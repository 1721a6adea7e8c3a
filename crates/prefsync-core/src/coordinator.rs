//! Serialized fetch-transform-commit cycles over the preferences document.
//!
//! A commit overwrites the whole document, so two overlapping cycles from the
//! same client would lose one side's change. [`UpdateCoordinator`] runs every
//! cycle while holding one async mutex owned by the coordinator instance.
//! The guard lives on the stack for the whole cycle and is released on every
//! exit path, including transform errors and cancelled futures.
//!
//! The lock is process-local. Other devices editing the same document still
//! resolve as plain last-write-wins at the store.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::PrefsError;
use crate::model::PreferenceItem;
use crate::store::PreferenceStore;

/// Outcome of a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Commit this list as the new document.
    Replace(Vec<PreferenceItem>),
    /// Leave the document as fetched; nothing is written.
    Unchanged,
}

/// Owns the store handle and the per-instance critical section.
pub struct UpdateCoordinator {
    store: Arc<dyn PreferenceStore>,
    lock: Mutex<()>,
}

/// Proof that the caller is inside the critical section.
struct CycleGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl UpdateCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }

    async fn enter(&self) -> CycleGuard<'_> {
        CycleGuard {
            _guard: self.lock.lock().await,
        }
    }

    /// Run one fetch-transform-commit cycle.
    ///
    /// Returns the committed list, or the fetched list when the transform
    /// reports [`Update::Unchanged`].
    ///
    /// # Errors
    ///
    /// Transform errors abort the cycle before anything is written. Store
    /// failures are passed through as [`PrefsError::Store`].
    pub async fn update<F>(&self, transform: F) -> Result<Vec<PreferenceItem>, PrefsError>
    where
        F: FnOnce(Vec<PreferenceItem>) -> Result<Update, PrefsError> + Send,
    {
        let _cycle = self.enter().await;

        let current = self.store.fetch_preferences().await?;
        let snapshot = current.clone();
        match transform(current)? {
            Update::Replace(next) => {
                self.store.commit_preferences(next.clone()).await?;
                debug!(items = next.len(), committed = true, "preferences cycle complete");
                Ok(next)
            }
            Update::Unchanged => {
                debug!(items = snapshot.len(), committed = false, "preferences cycle complete");
                Ok(snapshot)
            }
        }
    }
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCoordinator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::model::validate::ValidationError;
    use crate::model::{AdultContentPref, PreferenceKind};
    use std::time::Duration;

    fn adult(enabled: bool) -> PreferenceItem {
        PreferenceItem::AdultContent(AdultContentPref {
            enabled,
            ..AdultContentPref::default()
        })
    }

    #[tokio::test]
    async fn unchanged_skips_commit() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = UpdateCoordinator::new(store.clone());
        let items = coordinator
            .update(|_| Ok(Update::Unchanged))
            .await
            .expect("cycle");
        assert!(items.is_empty());
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn transform_error_aborts_and_releases_lock() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = UpdateCoordinator::new(store.clone());
        let err = coordinator
            .update(|_| Err(ValidationError::preference("guide", "bad").into()))
            .await
            .expect_err("transform fails");
        assert!(matches!(err, PrefsError::Validation(_)));
        assert_eq!(store.commit_count(), 0);

        let items = coordinator
            .update(|mut items| {
                items.push(adult(true));
                Ok(Update::Replace(items))
            })
            .await
            .expect("lock was released");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind(), Some(PreferenceKind::AdultContent));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cycles_are_serialized() {
        let store = Arc::new(MemoryStore::new().with_fetch_latency(Duration::from_millis(50)));
        let coordinator = UpdateCoordinator::new(store.clone());
        let append = |tag: &'static str| {
            move |mut items: Vec<PreferenceItem>| {
                items.push(PreferenceItem::from_value(serde_json::json!({
                    "$type": "com.example#marker",
                    "tag": tag,
                })));
                Ok(Update::Replace(items))
            }
        };
        let (a, b) = tokio::join!(coordinator.update(append("a")), coordinator.update(append("b")));
        a.expect("a");
        b.expect("b");
        assert_eq!(store.preferences().len(), 2);
        assert_eq!(store.commit_count(), 2);
    }
}
