//! prefsync-sim library.
//!
//! Seeded campaigns of concurrent preference updates against the in-memory
//! store, with an oracle that checks the end state of every seed.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod campaign;
pub mod oracle;
pub mod rng;
pub mod simulator;
pub mod workload;

pub use campaign::{CampaignConfig, CampaignReport, SeedFailure, replay_seed, run_campaign};
pub use oracle::{InvariantViolation, OracleResult, PreferenceOracle, RecordOutcome};
pub use simulator::{SimulationConfig, SimulationResult, simulate};
