//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Concurrent encode jobs, batch aggregation, and capacity search."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! Concurrent batches of encode jobs.
//!
//! [`BatchOrchestrator`] starts one thread per job with a short stagger,
//! joins them all, and folds the collected [`JobResult`]s into a
//! [`BatchResult`]. Nothing is cancelled once started.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use encbench_common::config::BatchConfig;
use encbench_engine::{PipelineEngine, PipelineSpec};
use encbench_logging::{log_system_event, LogContext, SystemEventOutcome};
use serde::Serialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use tracing::{info, warn};

use crate::error::{HarnessError, Result};
use crate::job::{FailureKind, JobResult, JobRunner, DEFAULT_POLL_INTERVAL};
use crate::metrics::HarnessMetrics;
use crate::policy::PassPolicy;
use crate::sink::ResultSink;
use crate::stats::Stats;

pub const DEFAULT_LAUNCH_STAGGER: Duration = Duration::from_millis(50);

/// Aggregate outcome of one batch, derived from its job results.
#[serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub requested: u32,
    pub successful: u32,
    pub failed: u32,
    /// Elapsed seconds over successful jobs.
    pub elapsed: Stats,
    /// Realtime multiple over successful jobs.
    pub rate: Stats,
    pub passed: bool,
    #[serde(rename = "wall_clock_secs")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub wall_clock: Duration,
    /// Sorted by job id, one entry per requested job.
    pub jobs: Vec<JobResult>,
}

impl BatchResult {
    /// Fold `jobs` into a batch result.
    ///
    /// Any id in `1..=requested` without a record is filled in as an
    /// [`FailureKind::UnexpectedFault`].
    pub fn from_jobs(
        requested: u32,
        mut jobs: Vec<JobResult>,
        wall_clock: Duration,
        policy: &PassPolicy,
        work: Duration,
    ) -> Self {
        jobs.sort_by_key(|job| job.job_id);
        jobs.dedup_by_key(|job| job.job_id);
        jobs.retain(|job| (1..=requested).contains(&job.job_id));
        for job_id in 1..=requested {
            if jobs.binary_search_by_key(&job_id, |job| job.job_id).is_err() {
                jobs.push(JobResult::failed(
                    job_id,
                    Duration::ZERO,
                    FailureKind::UnexpectedFault,
                    "job exited without publishing a result",
                ));
                jobs.sort_by_key(|job| job.job_id);
            }
        }

        let successes = || jobs.iter().filter(|job| job.success);
        let successful = successes().count() as u32;
        let elapsed = Stats::from_samples(successes().map(|job| job.elapsed.as_secs_f64()));
        let rate = Stats::from_samples(successes().map(|job| job.rate));
        let passed = successful == requested && successes().all(|job| policy.admits(job, work));

        Self {
            requested,
            successful,
            failed: requested - successful,
            elapsed,
            rate,
            passed,
            wall_clock,
            jobs,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn failed_ids(&self) -> Vec<u32> {
        self.jobs
            .iter()
            .filter(|job| !job.success)
            .map(|job| job.job_id)
            .collect()
    }

    pub fn first_error(&self) -> Option<&str> {
        self.jobs.iter().find_map(|job| job.error.as_deref())
    }
}

/// Runs batches of a given size; the capacity sweep drives one of these.
pub trait BatchExecutor {
    fn run_batch(&mut self, requested: u32) -> Result<BatchResult>;
}

#[derive(Debug)]
pub struct BatchOrchestrator {
    engine: Arc<dyn PipelineEngine>,
    spec: PipelineSpec,
    work: Duration,
    policy: PassPolicy,
    launch_stagger: Duration,
    poll_interval: Duration,
    metrics: Option<HarnessMetrics>,
}

impl BatchOrchestrator {
    pub fn new(
        engine: Arc<dyn PipelineEngine>,
        spec: PipelineSpec,
        work: Duration,
        policy: PassPolicy,
    ) -> Self {
        Self {
            engine,
            spec,
            work,
            policy,
            launch_stagger: DEFAULT_LAUNCH_STAGGER,
            poll_interval: DEFAULT_POLL_INTERVAL,
            metrics: None,
        }
    }

    pub fn with_batch_config(mut self, config: &BatchConfig) -> Self {
        self.launch_stagger = config.launch_stagger;
        self.poll_interval = config.poll_interval;
        self
    }

    pub fn with_metrics(mut self, metrics: HarnessMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn work(&self) -> Duration {
        self.work
    }

    pub fn policy(&self) -> &PassPolicy {
        &self.policy
    }

    /// Run `requested` jobs concurrently and block until all of them finish.
    pub fn run(&self, requested: u32) -> Result<BatchResult> {
        if requested == 0 {
            return Err(HarnessError::EmptyBatch);
        }
        let description = self.spec.describe(self.work);
        let variant = self.spec.encoder_element().to_owned();
        info!(
            batch_size = requested,
            work_secs = self.work.as_secs_f64(),
            engine = self.engine.name(),
            %description,
            "starting batch"
        );

        let sink = ResultSink::new();
        let started = Instant::now();
        let mut handles = Vec::with_capacity(requested as usize);
        for job_id in 1..=requested {
            if job_id > 1 {
                thread::sleep(self.launch_stagger);
            }
            let runner = JobRunner::new(
                job_id,
                self.work,
                description.clone(),
                Arc::clone(&self.engine),
                sink.clone(),
            )
            .with_poll_interval(self.poll_interval)
            .with_batch_size(requested);
            let spawned = thread::Builder::new()
                .name(format!("encbench-job-{job_id}"))
                .spawn(move || {
                    runner.run();
                });
            match spawned {
                Ok(handle) => handles.push((job_id, handle)),
                Err(err) => {
                    warn!(job_id, error = %err, "failed to spawn job thread");
                    sink.publish(JobResult::failed(
                        job_id,
                        Duration::ZERO,
                        FailureKind::UnexpectedFault,
                        format!("failed to spawn job thread: {err}"),
                    ));
                }
            }
        }

        for (job_id, handle) in handles {
            if handle.join().is_err() {
                warn!(job_id, "job thread terminated abnormally");
            }
        }
        let wall_clock = started.elapsed();

        let result =
            BatchResult::from_jobs(requested, sink.drain(), wall_clock, &self.policy, self.work);
        if let Some(metrics) = &self.metrics {
            metrics.observe_batch(&result);
        }

        let ctx = LogContext::new().with_batch(requested).with_variant(&variant);
        let (outcome, message) = if result.passed {
            (SystemEventOutcome::Success, "batch passed".to_owned())
        } else {
            (
                SystemEventOutcome::Fault,
                format!(
                    "batch failed: {}/{} jobs succeeded",
                    result.successful, result.requested
                ),
            )
        };
        log_system_event(Some(&ctx), "batch.completed", &message, outcome);
        Ok(result)
    }
}

impl BatchExecutor for BatchOrchestrator {
    fn run_batch(&mut self, requested: u32) -> Result<BatchResult> {
        self.run(requested)
    }
}
