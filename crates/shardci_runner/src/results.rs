use std::sync::Mutex;

use crate::executor::RunOutcome;

/// Collects outcomes from concurrently running shards.
///
/// Each shard appends exactly once. Appending the same shard twice is a caller
/// bug and is not deduplicated.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    outcomes: Mutex<Vec<RunOutcome>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, outcome: RunOutcome) {
        tracing::debug!(shard = %outcome.shard, kind = ?outcome.kind, "Recording outcome");
        self.outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(outcome);
    }

    /// Consumes the aggregator once every shard has been joined.
    pub fn finalize(self) -> RunSummary {
        let mut outcomes = self
            .outcomes
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        outcomes.sort_by(|a, b| a.shard.cmp(&b.shard));
        RunSummary { outcomes }
    }
}

/// Outcomes ordered by shard identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    outcomes: Vec<RunOutcome>,
}

impl RunSummary {
    pub fn outcomes(&self) -> &[RunOutcome] {
        &self.outcomes
    }

    /// True when no recorded outcome failed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(RunOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }
}
