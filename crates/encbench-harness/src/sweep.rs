//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Concurrent encode jobs, batch aggregation, and capacity search."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::thread;
use std::time::Duration;

use encbench_common::config::validate_candidates;
use serde::Serialize;
use tracing::info;

use crate::batch::{BatchExecutor, BatchResult};
use crate::error::{HarnessError, Result};

pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every candidate was executed.
    Exhausted,
    /// A batch reported at least one failed job.
    FirstFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Running { candidate_index: usize },
    Stopped(StopReason),
}

/// Everything a finished sweep observed.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub candidates: Vec<u32>,
    pub batches: Vec<BatchResult>,
    /// Largest candidate whose batch passed, 0 when none did.
    pub max_passing: u32,
    pub stop_reason: StopReason,
}

impl SweepReport {
    pub fn succeeded(&self) -> bool {
        self.max_passing > 0
    }

    /// Candidates never executed because the sweep stopped early.
    pub fn skipped(&self) -> &[u32] {
        &self.candidates[self.batches.len()..]
    }
}

/// Escalating search over batch sizes for the largest one that passes.
#[derive(Debug)]
pub struct CapacitySweep<E> {
    executor: E,
    candidates: Vec<u32>,
    cool_down: Duration,
    state: SweepState,
}

impl<E: BatchExecutor> CapacitySweep<E> {
    /// Candidates must be non-empty, at least 1 and strictly ascending.
    pub fn new(executor: E, candidates: Vec<u32>) -> Result<Self> {
        validate_candidates(&candidates)
            .map_err(|err| HarnessError::InvalidCandidates(err.to_string()))?;
        Ok(Self {
            executor,
            candidates,
            cool_down: DEFAULT_COOL_DOWN,
            state: SweepState::Idle,
        })
    }

    pub fn with_cool_down(mut self, cool_down: Duration) -> Self {
        self.cool_down = cool_down;
        self
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn run(&mut self) -> Result<SweepReport> {
        if self.state != SweepState::Idle {
            return Err(HarnessError::SweepFinished);
        }

        let mut batches = Vec::with_capacity(self.candidates.len());
        let mut max_passing: u32 = 0;
        for (candidate_index, &candidate) in self.candidates.iter().enumerate() {
            if candidate_index > 0 && !self.cool_down.is_zero() {
                info!(cool_down_ms = self.cool_down.as_millis() as u64, "cooling down");
                thread::sleep(self.cool_down);
            }
            self.state = SweepState::Running { candidate_index };
            info!(candidate_index, batch_size = candidate, "sweep step");

            let batch = self.executor.run_batch(candidate)?;
            if batch.passed {
                max_passing = max_passing.max(candidate);
            }
            let stop = batch.has_failures();
            batches.push(batch);
            if stop {
                info!(batch_size = candidate, "stopping sweep at first failure");
                self.state = SweepState::Stopped(StopReason::FirstFailure);
                break;
            }
        }
        if let SweepState::Running { .. } = self.state {
            self.state = SweepState::Stopped(StopReason::Exhausted);
        }

        let stop_reason = match self.state {
            SweepState::Stopped(reason) => reason,
            SweepState::Idle | SweepState::Running { .. } => StopReason::Exhausted,
        };
        info!(max_passing, ?stop_reason, "sweep finished");
        Ok(SweepReport {
            candidates: self.candidates.clone(),
            batches,
            max_passing,
            stop_reason,
        })
    }
}
