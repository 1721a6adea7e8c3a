//! One seeded run: a burst of concurrent preference updates through a single
//! agent, followed by a sequence of profile writes raced by rival writers.
//!
//! The run happens on a current-thread runtime with paused time, so injected
//! fetch delays cost nothing and the interleaving depends only on the seed.

use std::sync::Arc;

use anyhow::{Context, Result};
use prefsync_core::model::{
    FeedViewPatch, MutedWord, MutedWordTarget, PreferenceItem, SavedFeedType,
};
use prefsync_core::saved_feeds::SavedFeedDraft;
use prefsync_core::{
    AgentConfig, MemoryStore, PreferencesAgent, PrefsError, ProfileRecord, RecordDocument,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::oracle::{FinalState, RecordOutcome};
use crate::rng::DeterministicRng;
use crate::workload::{SimOp, Workload};

/// Owner identity used for record writes.
pub const SIM_OWNER: &str = "did:plc:sim";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Concurrent logical updates issued in the first phase.
    pub op_count: usize,
    /// Upper bound for each injected fetch delay.
    pub max_fetch_delay_ms: u64,
    /// Sequential profile writes in the second phase.
    pub record_op_count: usize,
    /// Upper bound for rival writers racing one profile write.
    pub max_rival_writers: u32,
    /// Retry bound handed to the agent's record updater.
    pub max_retries: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            op_count: 16,
            max_fetch_delay_ms: 40,
            record_op_count: 4,
            max_rival_writers: 7,
            max_retries: prefsync_core::record::DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub seed: u64,
    pub max_retries: u32,
    pub workload: Workload,
    pub preferences: Vec<PreferenceItem>,
    pub raw_preferences: Vec<Value>,
    pub untouched_items: Vec<Value>,
    pub commits: u64,
    /// `(op index, error)` for every update that returned an error.
    pub op_errors: Vec<(usize, String)>,
    pub record_outcomes: Vec<RecordOutcome>,
    pub display_name: Option<String>,
}

impl SimulationResult {
    /// Borrow the end state in the shape the oracle checks.
    #[must_use]
    pub fn final_state(&self) -> FinalState<'_> {
        FinalState {
            ops: &self.workload.ops,
            record_ops: &self.workload.record_ops,
            max_retries: self.max_retries,
            preferences: &self.preferences,
            raw_preferences: &self.raw_preferences,
            untouched_items: &self.untouched_items,
            commits: self.commits,
            op_errors: &self.op_errors,
            record_outcomes: &self.record_outcomes,
            display_name: self.display_name.as_deref(),
        }
    }

    /// Whether any profile write exhausted its retry bound.
    #[must_use]
    pub fn hit_retry_bound(&self) -> bool {
        self.record_outcomes
            .iter()
            .any(|outcome| matches!(outcome, RecordOutcome::Conflict { .. }))
    }
}

/// Run one seed to completion.
///
/// # Errors
///
/// Returns an error if the runtime cannot be built or a simulated task
/// panics. Failed operations are recorded in the result, not returned.
pub fn simulate(config: &SimulationConfig) -> Result<SimulationResult> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .context("failed to build simulation runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: &SimulationConfig) -> Result<SimulationResult> {
    let mut rng = DeterministicRng::new(config.seed);
    let workload = Workload::generate(
        &mut rng,
        config.op_count,
        config.max_fetch_delay_ms,
        config.record_op_count,
        config.max_rival_writers,
    );

    let untouched_items = vec![json!({
        "$type": "com.example.sim.defs#futurePref",
        "seed": config.seed,
    })];
    let store = Arc::new(MemoryStore::new());
    store.seed_raw_preferences(untouched_items.clone());
    store.push_fetch_delays(workload.fetch_delays());

    let agent_config = AgentConfig {
        record_max_retries: config.max_retries,
        ..AgentConfig::default()
    };
    let agent = Arc::new(PreferencesAgent::new(store.clone(), agent_config).with_session(SIM_OWNER));

    let mut tasks = JoinSet::new();
    for (index, op) in workload.ops.iter().cloned().enumerate() {
        let agent = Arc::clone(&agent);
        tasks.spawn(async move { (index, apply_op(&agent, op).await) });
    }
    let mut op_errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.context("simulated operation panicked")?;
        if let Err(err) = result {
            debug!(seed = config.seed, index, error = %err, "simulated operation failed");
            op_errors.push((index, err.to_string()));
        }
    }
    op_errors.sort();

    let mut record_outcomes = Vec::with_capacity(workload.record_ops.len());
    for op in &workload.record_ops {
        store.inject_rival_writers(op.rival_writers);
        let puts_before = store.record_put_count();
        let name = op.display_name.clone();
        let outcome = match agent
            .upsert_profile(move |existing| {
                let mut profile = existing.unwrap_or_default();
                profile.display_name = Some(name.clone());
                Ok(profile)
            })
            .await
        {
            Ok(_) => RecordOutcome::Written {
                attempts: u32::try_from(store.record_put_count() - puts_before)
                    .unwrap_or(u32::MAX),
            },
            Err(PrefsError::Conflict { attempts }) => RecordOutcome::Conflict { attempts },
            Err(err) => RecordOutcome::Failed {
                error: err.to_string(),
            },
        };
        // Rivals left over after a give-up must not leak into the next write.
        store.inject_rival_writers(0);
        record_outcomes.push(outcome);
    }

    let display_name = store
        .record(SIM_OWNER, ProfileRecord::COLLECTION, ProfileRecord::RKEY)
        .and_then(|record| {
            record
                .value
                .get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

    info!(
        seed = config.seed,
        ops = workload.ops.len(),
        commits = store.commit_count(),
        failed = op_errors.len(),
        "simulation seed finished"
    );

    Ok(SimulationResult {
        seed: config.seed,
        max_retries: config.max_retries,
        preferences: store.preferences(),
        raw_preferences: store.raw_preferences(),
        untouched_items,
        commits: store.commit_count(),
        op_errors,
        record_outcomes,
        display_name,
        workload,
    })
}

async fn apply_op(agent: &PreferencesAgent, op: SimOp) -> Result<(), PrefsError> {
    match op {
        SimOp::AddMutedWord { value } => {
            agent
                .add_muted_word(MutedWord::new(value, vec![MutedWordTarget::Content]))
                .await
        }
        SimOp::HidePost { uri } => agent.hide_post(&uri).await,
        SimOp::AddLabeler { did } => agent.add_labeler(&did).await,
        SimOp::AddSavedFeed { uri, pinned } => agent
            .add_saved_feeds(vec![SavedFeedDraft::new(SavedFeedType::Feed, uri, pinned)])
            .await
            .map(drop),
        SimOp::QueueNudge { nudge } => agent.queue_nudges(vec![nudge]).await,
        SimOp::EnableAdultContent => agent.set_adult_content_enabled(true).await,
        SimOp::SetFeedView { feed, hide_reposts } => {
            agent
                .set_feed_view_prefs(
                    &feed,
                    FeedViewPatch {
                        hide_reposts: Some(hide_reposts),
                        ..FeedViewPatch::default()
                    },
                )
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_outcome() {
        let config = SimulationConfig {
            seed: 11,
            ..SimulationConfig::default()
        };
        let a = simulate(&config).expect("first run");
        let b = simulate(&config).expect("second run");
        assert_eq!(a.workload, b.workload);
        assert_eq!(a.commits, b.commits);
        assert_eq!(a.record_outcomes, b.record_outcomes);
        assert_eq!(a.display_name, b.display_name);
    }

    #[test]
    fn every_op_commits_once() {
        let result = simulate(&SimulationConfig {
            seed: 3,
            op_count: 24,
            ..SimulationConfig::default()
        })
        .expect("run");
        assert!(result.op_errors.is_empty(), "{:?}", result.op_errors);
        assert_eq!(result.commits, 24);
        assert!(result.raw_preferences.contains(&result.untouched_items[0]));
    }

    #[test]
    fn profile_writes_match_their_rival_counts() {
        let result = simulate(&SimulationConfig {
            seed: 5,
            op_count: 0,
            record_op_count: 8,
            max_rival_writers: 8,
            ..SimulationConfig::default()
        })
        .expect("run");
        assert_eq!(result.commits, 0);
        for (op, outcome) in result.workload.record_ops.iter().zip(&result.record_outcomes) {
            assert_eq!(
                *outcome,
                RecordOutcome::expected(op.rival_writers, result.max_retries),
                "rivals: {}",
                op.rival_writers
            );
        }
    }
}
