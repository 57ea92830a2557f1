//! Status - バッチ実行の結果レポート

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Action, ItemId, ItemKind, ItemState, RunId, TransitionId};

/// Per-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Items read from the store.
    pub scanned: usize,
    /// Items skipped for a missing timestamp.
    pub skipped: usize,
    pub noop: usize,
    pub marked_stale: usize,
    pub closed: usize,
    /// Actions left for the next run by `operations-per-run`.
    pub deferred: usize,
    pub failed: usize,
    /// Actions cut off by the batch deadline.
    pub timed_out: usize,
}

/// One item moved to a new state (or, in a dry run, would have been).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub transition_id: TransitionId,
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub action: Action,
    pub from: ItemState,
    pub to: ItemState,
    pub at: DateTime<Utc>,
    pub dry_run: bool,
}

/// One item whose action could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub item_id: ItemId,
    pub action: Action,
    pub error: String,
}

/// Result of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub counts: RunCounts,
    pub transitions: Vec<TransitionRecord>,
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    pub fn new(run_id: RunId, started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            run_id,
            started_at,
            dry_run,
            counts: RunCounts::default(),
            transitions: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record_transition(&mut self, record: TransitionRecord) {
        match record.action {
            Action::MarkStale => self.counts.marked_stale += 1,
            Action::Close => self.counts.closed += 1,
            Action::NoOp => self.counts.noop += 1,
        }
        self.transitions.push(record);
    }

    pub fn record_failure(&mut self, record: FailureRecord) {
        self.counts.failed += 1;
        self.failures.push(record);
    }

    /// True when every planned action went through.
    pub fn is_clean(&self) -> bool {
        self.counts.failed == 0 && self.counts.timed_out == 0
    }
}
