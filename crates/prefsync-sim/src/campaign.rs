//! Seed sweeps.
//!
//! A campaign runs the same simulation parameters over a range of seeds and
//! reports which seeds broke an invariant, lowest first, so the first one
//! can be replayed on its own.

use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result, bail};
use prefsync_core::AgentConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::oracle::{OracleResult, PreferenceOracle};
use crate::simulator::{SimulationConfig, SimulationResult, simulate};

/// Campaign-level configuration: which seeds to run and the per-seed
/// simulation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Seeds to run, end exclusive.
    pub seed_range: Range<u64>,
    pub op_count: usize,
    pub max_fetch_delay_ms: u64,
    pub record_op_count: usize,
    pub max_rival_writers: u32,
    pub max_retries: u32,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            op_count: sim.op_count,
            max_fetch_delay_ms: sim.max_fetch_delay_ms,
            record_op_count: sim.record_op_count,
            max_rival_writers: sim.max_rival_writers,
            max_retries: sim.max_retries,
        }
    }
}

impl CampaignConfig {
    /// Load a campaign from a TOML file; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Default campaign run with the retry bound an agent is configured with.
    #[must_use]
    pub fn for_agent(agent: &AgentConfig) -> Self {
        Self {
            max_retries: agent.record_max_retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            op_count: self.op_count,
            max_fetch_delay_ms: self.max_fetch_delay_ms,
            record_op_count: self.record_op_count,
            max_rival_writers: self.max_rival_writers,
            max_retries: self.max_retries,
        }
    }

    /// # Errors
    ///
    /// Returns an error for an empty seed range or a seed with no work.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.op_count == 0 && self.record_op_count == 0 {
            bail!("a campaign needs at least one operation per seed");
        }
        Ok(())
    }
}

/// Rendered violations for one failing seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// Lowest failing seed.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds where at least one profile write exhausted its retry bound.
    pub retry_bound_reached: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single seed replayed with its full end state.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    pub result: SimulationResult,
    pub oracle: OracleResult,
}

/// Run every seed in `config.seed_range`.
///
/// # Errors
///
/// Invalid config, or a seed whose simulation could not run at all.
/// Invariant violations are reported, not returned.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        retry_bound_reached: 0,
    };

    for seed in config.seed_range.clone() {
        report.seeds_run += 1;
        let trace = run_seed(seed, config)?;
        if trace.result.hit_retry_bound() {
            report.retry_bound_reached += 1;
        }
        if trace.oracle.passed {
            report.seeds_passed += 1;
        } else {
            warn!(seed, violations = trace.oracle.violations.len(), "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: trace
                    .oracle
                    .violations
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }
    }

    Ok(report)
}

/// Run one seed and keep its full end state.
///
/// # Errors
///
/// As [`run_campaign`].
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    config.validate()?;
    run_seed(seed, config)
}

fn run_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    let result = simulate(&config.sim_config_for_seed(seed))
        .with_context(|| format!("seed {seed} failed to run"))?;
    let oracle = PreferenceOracle::check_all(&result.final_state());
    Ok(DetailedTrace { result, oracle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_config_default_is_valid() {
        assert!(CampaignConfig::default().validate().is_ok());
    }

    #[test]
    fn campaign_config_empty_seed_range_rejected() {
        let config = CampaignConfig {
            seed_range: 5..5,
            ..CampaignConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn campaign_config_without_ops_rejected() {
        let config = CampaignConfig {
            op_count: 0,
            record_op_count: 0,
            ..CampaignConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn sim_config_for_seed_uses_correct_seed() {
        let config = CampaignConfig::default();
        let sim = config.sim_config_for_seed(42);
        assert_eq!(sim.seed, 42);
        assert_eq!(sim.op_count, config.op_count);
        assert_eq!(sim.max_retries, config.max_retries);
    }

    #[test]
    fn agent_retry_bound_carries_into_each_seed() {
        let agent = AgentConfig {
            record_max_retries: 2,
            ..AgentConfig::default()
        };
        let config = CampaignConfig::for_agent(&agent);
        assert_eq!(config.sim_config_for_seed(9).max_retries, 2);
        assert_eq!(config.seed_range, CampaignConfig::default().seed_range);
    }

    #[test]
    fn campaign_config_loads_partial_toml() {
        let dir = std::env::temp_dir().join(format!("prefsync-sim-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join("campaign.toml");
        std::fs::write(&path, "op_count = 8\n[seed_range]\nstart = 3\nend = 9\n").expect("write");
        let config = CampaignConfig::load(&path).expect("load");
        assert_eq!(config.op_count, 8);
        assert_eq!(config.seed_range, 3..9);
        assert_eq!(config.max_retries, CampaignConfig::default().max_retries);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn replay_seed_produces_detailed_trace() {
        let config = CampaignConfig {
            seed_range: 0..1,
            ..CampaignConfig::default()
        };
        let trace = replay_seed(42, &config).expect("replay should not error");
        assert_eq!(trace.result.workload.ops.len(), config.op_count);
        assert!(trace.oracle.passed, "oracle should pass: {:?}", trace.oracle.violations);
    }

    #[test]
    fn campaign_report_serializes_to_json() {
        let report = CampaignReport {
            seeds_run: 10,
            seeds_passed: 9,
            first_failure: Some(7),
            failures: vec![SeedFailure {
                seed: 7,
                violations: vec!["LostUpdate: op 3 missing".into()],
            }],
            retry_bound_reached: 4,
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"seeds_run\":10"));
        assert!(json.contains("\"first_failure\":7"));
    }
}
