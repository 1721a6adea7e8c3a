//! prefsync-core library.
//!
//! Keeps a remote, multi-schema preferences document consistent while many
//! independent logical updates are issued against it. Every list mutation
//! is a fetch-transform-commit cycle run under [`UpdateCoordinator`]; single
//! named records use a bounded compare-and-swap loop ([`RecordUpdater`]).
//!
//! # Conventions
//!
//! - **Errors**: Library operations return [`PrefsError`]; config loading
//!   uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod labelers;
pub mod memory;
pub mod model;
pub mod record;
pub mod reducers;
pub mod saved_feeds;
pub mod store;
pub mod syntax;
pub mod tid;
pub mod view;

pub use agent::PreferencesAgent;
pub use config::AgentConfig;
pub use coordinator::{Update, UpdateCoordinator};
pub use error::{ErrorCode, PrefsError};
pub use memory::MemoryStore;
pub use model::PreferenceItem;
pub use record::{ProfileRecord, RecordDocument, RecordUpdater};
pub use store::{LabelerService, PreferenceStore, RecordStore, StoreError};
pub use view::Preferences;
