//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Concurrent encode jobs, batch aggregation, and capacity search."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::sync::Arc;

use prometheus::{
    self, GaugeVec, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::batch::BatchResult;
use crate::error::Result;
use crate::job::JobResult;

/// Registry shared between the metric families and the exporter.
pub type SharedRegistry = Arc<Registry>;

pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Metrics published while a sweep runs.
#[derive(Clone)]
pub struct HarnessMetrics {
    registry: SharedRegistry,
    jobs_total: IntCounterVec,
    job_elapsed_seconds: Histogram,
    job_rate: GaugeVec,
    batches_total: IntCounterVec,
    max_passing_streams: IntGauge,
}

impl HarnessMetrics {
    /// Register the harness metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let jobs_total = IntCounterVec::new(
            Opts::new("encbench_jobs_total", "Encode jobs finished, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(jobs_total.clone()))?;

        let job_elapsed_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "encbench_job_elapsed_seconds",
                "Wall time between starting a pipeline and its terminal event",
            )
            .buckets(prometheus::exponential_buckets(0.25, 2.0, 10)?),
        )?;
        registry.register(Box::new(job_elapsed_seconds.clone()))?;

        let job_rate = GaugeVec::new(
            Opts::new(
                "encbench_job_rate",
                "Average realtime multiple of successful jobs for the last batch of each size",
            ),
            &["batch_size"],
        )?;
        registry.register(Box::new(job_rate.clone()))?;

        let batches_total = IntCounterVec::new(
            Opts::new("encbench_batches_total", "Batches executed, by pass status"),
            &["status"],
        )?;
        registry.register(Box::new(batches_total.clone()))?;

        let max_passing_streams = IntGauge::new(
            "encbench_max_passing_streams",
            "Largest batch size that passed during the sweep",
        )?;
        registry.register(Box::new(max_passing_streams.clone()))?;

        Ok(Self {
            registry,
            jobs_total,
            job_elapsed_seconds,
            job_rate,
            batches_total,
            max_passing_streams,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn observe_job(&self, job: &JobResult) {
        let outcome = job.failure.map(|kind| kind.as_str()).unwrap_or("success");
        self.jobs_total.with_label_values(&[outcome]).inc();
        self.job_elapsed_seconds.observe(job.elapsed.as_secs_f64());
    }

    /// Record every job of the batch plus its pass status.
    pub fn observe_batch(&self, batch: &BatchResult) {
        for job in &batch.jobs {
            self.observe_job(job);
        }
        let status = if batch.passed { "pass" } else { "fail" };
        self.batches_total.with_label_values(&[status]).inc();
        let batch_size = batch.requested.to_string();
        self.job_rate
            .with_label_values(&[batch_size.as_str()])
            .set(batch.rate.avg);
    }

    pub fn set_max_passing(&self, streams: u32) {
        self.max_passing_streams.set(i64::from(streams));
    }

    /// Prometheus text exposition of every registered family.
    pub fn encode_text(&self) -> Result<String> {
        let families = self.registry.gather();
        Ok(TextEncoder::new().encode_to_string(&families)?)
    }

    pub fn write_text(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.encode_text()?)?;
        Ok(())
    }
}

impl std::fmt::Debug for HarnessMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::job::FailureKind;
    use crate::policy::PassPolicy;

    #[test]
    fn batch_observation_is_exported() {
        let metrics = HarnessMetrics::new(new_registry()).unwrap();
        let work = Duration::from_secs(20);
        let jobs = vec![
            JobResult::succeeded(1, Duration::from_secs(10), work),
            JobResult::failed(2, Duration::ZERO, FailureKind::StartFailure, "busy"),
        ];
        let batch = BatchResult::from_jobs(
            2,
            jobs,
            Duration::from_secs(10),
            &PassPolicy::default(),
            work,
        );
        metrics.observe_batch(&batch);
        metrics.set_max_passing(1);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("encbench_jobs_total{outcome=\"start_failure\"} 1"));
        assert!(text.contains("encbench_jobs_total{outcome=\"success\"} 1"));
        assert!(text.contains("encbench_batches_total{status=\"fail\"} 1"));
        assert!(text.contains("encbench_job_rate{batch_size=\"2\"} 2"));
        assert!(text.contains("encbench_max_passing_streams 1"));
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = new_registry();
        HarnessMetrics::new(registry.clone()).unwrap();
        assert!(HarnessMetrics::new(registry).is_err());
    }
}
