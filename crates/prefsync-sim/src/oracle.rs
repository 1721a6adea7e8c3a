use std::collections::BTreeMap;

use prefsync_core::model::{
    PreferenceItem, PreferenceKind, last_adult_content, last_app_state, last_feed_view,
    last_hidden_posts, last_muted_words, last_saved_feeds_v2,
};
use prefsync_core::reducers::labeler_dids;
use prefsync_core::saved_feeds::is_pinned_first;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workload::{RecordOp, SimOp};

// ── Inputs ───────────────────────────────────────────────────────────────────

/// How one profile write ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Written { attempts: u32 },
    Conflict { attempts: u32 },
    Failed { error: String },
}

impl RecordOutcome {
    /// What a bounded CAS loop must report against `rival_writers` rivals.
    #[must_use]
    pub const fn expected(rival_writers: u32, max_retries: u32) -> Self {
        let max_attempts = max_retries.saturating_add(1);
        if rival_writers < max_attempts {
            Self::Written {
                attempts: rival_writers + 1,
            }
        } else {
            Self::Conflict {
                attempts: max_attempts,
            }
        }
    }
}

/// The observable end state of one seed.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalState<'a> {
    pub ops: &'a [SimOp],
    pub record_ops: &'a [RecordOp],
    pub max_retries: u32,
    pub preferences: &'a [PreferenceItem],
    pub raw_preferences: &'a [Value],
    /// Items that were in the document before any operation ran and that
    /// no operation owns.
    pub untouched_items: &'a [Value],
    pub commits: u64,
    pub op_errors: &'a [(usize, String)],
    pub record_outcomes: &'a [RecordOutcome],
    pub display_name: Option<&'a str>,
}

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResult {
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// A broken invariant, with enough detail to start debugging from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "invariant", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// A logical update returned success but its effect is not in the
    /// final document.
    LostUpdate { index: usize, op: SimOp },
    /// A logical update that should always succeed returned an error.
    OperationFailed { index: usize, error: String },
    /// More than one item of a kind that is written as a single item.
    DuplicateKind { kind: String, count: usize },
    /// Saved feeds not in pinned-first order.
    SavedFeedOrder { pinned: Vec<bool> },
    DuplicateSavedFeedId { id: String },
    /// A pre-existing item that no operation owns was dropped or changed.
    ItemNotPreserved { item: Value },
    CommitCount { expected: u64, actual: u64 },
    RecordOutcome {
        index: usize,
        rival_writers: u32,
        expected: RecordOutcome,
        actual: RecordOutcome,
    },
    DisplayName {
        expected: Option<String>,
        actual: Option<String>,
    },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LostUpdate { index, op } => write!(f, "LostUpdate: op {index} ({op:?}) missing"),
            Self::OperationFailed { index, error } => {
                write!(f, "OperationFailed: op {index} returned {error}")
            }
            Self::DuplicateKind { kind, count } => {
                write!(f, "DuplicateKind: {count} items of {kind}")
            }
            Self::SavedFeedOrder { pinned } => {
                write!(f, "SavedFeedOrder: pinned flags out of order {pinned:?}")
            }
            Self::DuplicateSavedFeedId { id } => write!(f, "DuplicateSavedFeedId: {id}"),
            Self::ItemNotPreserved { item } => write!(f, "ItemNotPreserved: {item}"),
            Self::CommitCount { expected, actual } => {
                write!(f, "CommitCount: expected {expected}, store saw {actual}")
            }
            Self::RecordOutcome {
                index,
                rival_writers,
                expected,
                actual,
            } => write!(
                f,
                "RecordOutcome: write {index} against {rival_writers} rivals \
                 expected {expected:?}, got {actual:?}"
            ),
            Self::DisplayName { expected, actual } => {
                write!(f, "DisplayName: expected {expected:?}, got {actual:?}")
            }
        }
    }
}

// ── Oracle ───────────────────────────────────────────────────────────────────

/// Checks the end state of a seed against what its workload guarantees.
///
/// # Invariants checked
///
/// 1. **No lost updates**: every successful operation's effect is present.
/// 2. **Single item per kind**: kinds written as one item appear once.
/// 3. **Saved-feed ordering**: pinned entries lead and ids are unique.
/// 4. **Preservation**: untouched pre-existing items survive verbatim.
/// 5. **One commit per operation**: every generated op changes the document.
/// 6. **Bounded CAS**: each profile write ends as its rival count dictates.
pub struct PreferenceOracle;

impl PreferenceOracle {
    #[must_use]
    pub fn check_all(state: &FinalState<'_>) -> OracleResult {
        let mut violations = Vec::new();
        violations.extend(Self::check_operations(state));
        violations.extend(Self::check_single_items(state.preferences));
        violations.extend(Self::check_saved_feeds(state.preferences));
        violations.extend(Self::check_preserved(state));
        violations.extend(Self::check_commits(state));
        violations.extend(Self::check_records(state));
        OracleResult::from_violations(violations)
    }

    fn check_operations(state: &FinalState<'_>) -> Vec<InvariantViolation> {
        let mut violations: Vec<InvariantViolation> = state
            .op_errors
            .iter()
            .map(|(index, error)| InvariantViolation::OperationFailed {
                index: *index,
                error: error.clone(),
            })
            .collect();
        for (index, op) in state.ops.iter().enumerate() {
            if state.op_errors.iter().any(|(failed, _)| *failed == index) {
                continue;
            }
            if !effect_present(state.preferences, op) {
                violations.push(InvariantViolation::LostUpdate {
                    index,
                    op: op.clone(),
                });
            }
        }
        violations
    }

    fn check_single_items(items: &[PreferenceItem]) -> Vec<InvariantViolation> {
        const SINGLE: [PreferenceKind; 6] = [
            PreferenceKind::AdultContent,
            PreferenceKind::Labelers,
            PreferenceKind::SavedFeedsV2,
            PreferenceKind::MutedWords,
            PreferenceKind::HiddenPosts,
            PreferenceKind::AppState,
        ];
        let mut violations = Vec::new();
        for kind in SINGLE {
            let count = items.iter().filter(|item| item.is_kind(kind)).count();
            if count > 1 {
                violations.push(InvariantViolation::DuplicateKind {
                    kind: kind.to_string(),
                    count,
                });
            }
        }
        let mut per_feed: BTreeMap<&str, usize> = BTreeMap::new();
        for item in items {
            if let PreferenceItem::FeedView(pref) = item {
                *per_feed.entry(pref.feed.as_str()).or_default() += 1;
            }
        }
        violations.extend(per_feed.into_iter().filter(|(_, n)| *n > 1).map(|(feed, count)| {
            InvariantViolation::DuplicateKind {
                kind: format!("{} for {feed}", PreferenceKind::FeedView),
                count,
            }
        }));
        violations
    }

    fn check_saved_feeds(items: &[PreferenceItem]) -> Vec<InvariantViolation> {
        let Some(pref) = last_saved_feeds_v2(items) else {
            return Vec::new();
        };
        let mut violations = Vec::new();
        if !is_pinned_first(&pref.items) {
            violations.push(InvariantViolation::SavedFeedOrder {
                pinned: pref.items.iter().map(|f| f.pinned).collect(),
            });
        }
        let mut seen: Vec<&str> = Vec::with_capacity(pref.items.len());
        for feed in &pref.items {
            if seen.contains(&feed.id.as_str()) {
                violations.push(InvariantViolation::DuplicateSavedFeedId {
                    id: feed.id.clone(),
                });
            }
            seen.push(&feed.id);
        }
        violations
    }

    fn check_preserved(state: &FinalState<'_>) -> Vec<InvariantViolation> {
        state
            .untouched_items
            .iter()
            .filter(|item| !state.raw_preferences.contains(item))
            .map(|item| InvariantViolation::ItemNotPreserved { item: item.clone() })
            .collect()
    }

    fn check_commits(state: &FinalState<'_>) -> Vec<InvariantViolation> {
        let succeeded = state.ops.len().saturating_sub(state.op_errors.len());
        let expected = u64::try_from(succeeded).unwrap_or(u64::MAX);
        if state.commits == expected {
            Vec::new()
        } else {
            vec![InvariantViolation::CommitCount {
                expected,
                actual: state.commits,
            }]
        }
    }

    fn check_records(state: &FinalState<'_>) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let mut expected_name = None;
        for (index, (op, actual)) in state
            .record_ops
            .iter()
            .zip(state.record_outcomes)
            .enumerate()
        {
            let expected = RecordOutcome::expected(op.rival_writers, state.max_retries);
            if matches!(expected, RecordOutcome::Written { .. }) {
                expected_name = Some(op.display_name.clone());
            }
            if *actual != expected {
                violations.push(InvariantViolation::RecordOutcome {
                    index,
                    rival_writers: op.rival_writers,
                    expected,
                    actual: actual.clone(),
                });
            }
        }
        let actual_name = state.display_name.map(str::to_string);
        if actual_name != expected_name {
            violations.push(InvariantViolation::DisplayName {
                expected: expected_name,
                actual: actual_name,
            });
        }
        violations
    }
}

fn effect_present(items: &[PreferenceItem], op: &SimOp) -> bool {
    match op {
        SimOp::AddMutedWord { value } => last_muted_words(items)
            .is_some_and(|pref| pref.items.iter().any(|word| &word.value == value)),
        SimOp::HidePost { uri } => {
            last_hidden_posts(items).is_some_and(|pref| pref.items.contains(uri))
        }
        SimOp::AddLabeler { did } => labeler_dids(items).contains(did),
        SimOp::AddSavedFeed { uri, pinned } => last_saved_feeds_v2(items).is_some_and(|pref| {
            pref.items
                .iter()
                .any(|feed| &feed.value == uri && feed.pinned == *pinned)
        }),
        SimOp::QueueNudge { nudge } => {
            last_app_state(items).is_some_and(|pref| pref.queued_nudges.contains(nudge))
        }
        SimOp::EnableAdultContent => last_adult_content(items).is_some_and(|pref| pref.enabled),
        SimOp::SetFeedView { feed, hide_reposts } => last_feed_view(items, feed)
            .is_some_and(|pref| pref.hide_reposts == Some(*hide_reposts)),
    }
}
