//! Seeded workloads of logical preference updates.
//!
//! Every generated operation has an effect that can be checked in the final
//! document regardless of the order the coordinator ran it in: values are
//! unique per operation, and nothing removes what another operation added.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;

/// One logical update issued against the shared agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SimOp {
    AddMutedWord { value: String },
    HidePost { uri: String },
    AddLabeler { did: String },
    AddSavedFeed { uri: String, pinned: bool },
    QueueNudge { nudge: String },
    EnableAdultContent,
    SetFeedView { feed: String, hide_reposts: bool },
}

impl SimOp {
    fn generate(index: usize, rng: &mut DeterministicRng) -> Self {
        match rng.next_bounded(7) {
            0 => Self::AddMutedWord {
                value: format!("word-{index}"),
            },
            1 => Self::HidePost {
                uri: format!("at://did:plc:sim/app.bsky.feed.post/p{index}"),
            },
            2 => Self::AddLabeler {
                did: format!("did:plc:labeler{index}"),
            },
            3 => Self::AddSavedFeed {
                uri: format!("at://did:plc:sim/app.bsky.feed.generator/f{index}"),
                pinned: rng.coin(),
            },
            4 => Self::QueueNudge {
                nudge: format!("nudge-{index}"),
            },
            5 => Self::EnableAdultContent,
            _ => Self::SetFeedView {
                feed: format!("at://did:plc:sim/app.bsky.feed.generator/v{index}"),
                hide_reposts: rng.coin(),
            },
        }
    }
}

/// A profile rename issued after the concurrent phase, with the number of
/// rival writers that race it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOp {
    pub display_name: String,
    pub rival_writers: u32,
}

/// Everything one seed runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub ops: Vec<SimOp>,
    /// Fetch delay for each coordinator cycle, consumed in fetch order.
    pub fetch_delays_ms: Vec<u64>,
    pub record_ops: Vec<RecordOp>,
}

impl Workload {
    /// Build the workload for one seed.
    #[must_use]
    pub fn generate(
        rng: &mut DeterministicRng,
        op_count: usize,
        max_fetch_delay_ms: u64,
        record_op_count: usize,
        max_rival_writers: u32,
    ) -> Self {
        let mut op_rng = rng.fork();
        let mut delay_rng = rng.fork();
        let mut record_rng = rng.fork();

        let ops: Vec<SimOp> = (0..op_count)
            .map(|i| SimOp::generate(i, &mut op_rng))
            .collect();
        let fetch_delays_ms = ops
            .iter()
            .map(|_| delay_rng.up_to(max_fetch_delay_ms))
            .collect();
        let record_ops = (0..record_op_count)
            .map(|i| RecordOp {
                display_name: format!("sim user {i}"),
                rival_writers: u32::try_from(record_rng.up_to(u64::from(max_rival_writers)))
                    .unwrap_or(max_rival_writers),
            })
            .collect();
        Self {
            ops,
            fetch_delays_ms,
            record_ops,
        }
    }

    #[must_use]
    pub fn fetch_delays(&self) -> Vec<Duration> {
        self.fetch_delays_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let a = Workload::generate(&mut DeterministicRng::new(9), 20, 40, 3, 6);
        let b = Workload::generate(&mut DeterministicRng::new(9), 20, 40, 3, 6);
        assert_eq!(a, b);
        assert_eq!(a.ops.len(), 20);
        assert_eq!(a.fetch_delays_ms.len(), 20);
        assert!(a.fetch_delays_ms.iter().all(|ms| *ms <= 40));
        assert!(a.record_ops.iter().all(|op| op.rival_writers <= 6));
    }

    #[test]
    fn record_ops_do_not_depend_on_op_count() {
        let short = Workload::generate(&mut DeterministicRng::new(4), 5, 40, 4, 7);
        let long = Workload::generate(&mut DeterministicRng::new(4), 50, 40, 4, 7);
        assert_eq!(short.record_ops, long.record_ops);
        assert_eq!(short.ops[..], long.ops[..5]);
    }

    #[test]
    fn ops_serialize_with_a_tag() {
        let json = serde_json::to_value(SimOp::EnableAdultContent).expect("serialize");
        assert_eq!(json["op"], "enable_adult_content");
    }
}
