//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "binary"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Command-line entrypoint for capacity sweeps and encoder probes."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, ValueEnum};
use encbench_common::config::{AppConfig, PolicyConfig};
use encbench_engine::{EngineRuntime, PipelineSpec};
use encbench_harness::report::{render_batch, render_summary, write_json_report};
use encbench_harness::{
    new_registry, BatchExecutor, BatchOrchestrator, BatchResult, CapacitySweep, HarnessMetrics,
    PassPolicy,
};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    OnTime,
    MinRate,
}

/// Workload options shared by `sweep` and `batch`.
#[derive(Debug, Default, Args)]
pub struct WorkloadArgs {
    /// Seconds of video each job encodes.
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Overhead factor for on-time, minimum realtime multiple for min-rate.
    #[arg(long, value_name = "X")]
    threshold: Option<f64>,
}

impl WorkloadArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(secs) = self.duration {
            config.sweep.work_duration = Duration::from_secs(secs);
        }
        config.policy = override_policy(config.policy, self.policy, self.threshold);
    }
}

fn override_policy(
    current: PolicyConfig,
    kind: Option<PolicyArg>,
    threshold: Option<f64>,
) -> PolicyConfig {
    let on_time = |factor: Option<f64>| PolicyConfig::OnTime {
        overhead_factor: factor.unwrap_or(1.1),
    };
    let min_rate = |value: Option<f64>| PolicyConfig::MinRate {
        threshold: value.unwrap_or(1.0),
    };
    match (kind, current) {
        (None, PolicyConfig::OnTime { overhead_factor }) => {
            on_time(threshold.or(Some(overhead_factor)))
        }
        (None, PolicyConfig::MinRate { threshold: existing }) => {
            min_rate(threshold.or(Some(existing)))
        }
        (Some(PolicyArg::OnTime), PolicyConfig::OnTime { overhead_factor }) => {
            on_time(threshold.or(Some(overhead_factor)))
        }
        (Some(PolicyArg::OnTime), PolicyConfig::MinRate { .. }) => on_time(threshold),
        (Some(PolicyArg::MinRate), PolicyConfig::MinRate { threshold: existing }) => {
            min_rate(threshold.or(Some(existing)))
        }
        (Some(PolicyArg::MinRate), PolicyConfig::OnTime { .. }) => min_rate(threshold),
    }
}

#[derive(Debug, Default, Args)]
pub struct SweepArgs {
    /// Comma-separated ascending batch sizes, e.g. `1,2,4,8`.
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    candidates: Option<Vec<u32>>,

    #[command(flatten)]
    workload: WorkloadArgs,

    /// Write the sweep as JSON to this path.
    #[arg(long, value_name = "FILE")]
    report_json: Option<PathBuf>,

    /// Write Prometheus text metrics to this path.
    #[arg(long, value_name = "FILE")]
    metrics_out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Number of concurrent streams.
    #[arg(long, value_name = "N")]
    streams: u32,

    #[command(flatten)]
    workload: WorkloadArgs,
}

/// Prints each batch block as soon as the batch finishes.
struct PrintingExecutor {
    inner: BatchOrchestrator,
}

impl BatchExecutor for PrintingExecutor {
    fn run_batch(&mut self, requested: u32) -> encbench_harness::Result<BatchResult> {
        let rule = "=".repeat(60);
        println!("\n{rule}\nTesting {requested} concurrent streams\n{rule}");
        let batch = self.inner.run(requested)?;
        print!(
            "{}",
            render_batch(&batch, self.inner.policy(), self.inner.work())
        );
        Ok(batch)
    }
}

pub fn run_sweep(mut config: AppConfig, args: SweepArgs) -> Result<bool> {
    args.workload.apply(&mut config);
    if let Some(candidates) = args.candidates {
        config.sweep.candidates = candidates;
    }
    config.validate()?;
    let policy = PassPolicy::try_from(config.policy)?;
    let work = config.sweep.work_duration;

    let runtime = init_runtime(&config)?;
    let metrics = HarnessMetrics::new(new_registry())?;
    print_header(&config, &policy, &runtime);

    let orchestrator = BatchOrchestrator::new(
        runtime.engine(),
        PipelineSpec::new(config.pipeline.clone()),
        work,
        policy,
    )
    .with_batch_config(&config.batch)
    .with_metrics(metrics.clone());
    let mut sweep = CapacitySweep::new(
        PrintingExecutor {
            inner: orchestrator,
        },
        config.sweep.candidates.clone(),
    )?
    .with_cool_down(config.sweep.cool_down);

    let report = sweep.run()?;
    drop(sweep);
    metrics.set_max_passing(report.max_passing);
    print!("{}", render_summary(&report));

    if let Some(path) = &args.report_json {
        write_json_report(path, &report, &policy, work, Utc::now())
            .with_context(|| format!("failed to write report {}", path.display()))?;
    }
    if let Some(path) = &args.metrics_out {
        metrics
            .write_text(path)
            .with_context(|| format!("failed to write metrics {}", path.display()))?;
        info!(path = %path.display(), "metrics written");
    }
    Ok(report.succeeded())
}

pub fn run_batch(mut config: AppConfig, args: BatchArgs) -> Result<bool> {
    args.workload.apply(&mut config);
    config.validate()?;
    let policy = PassPolicy::try_from(config.policy)?;
    let work = config.sweep.work_duration;

    let runtime = init_runtime(&config)?;
    print_header(&config, &policy, &runtime);
    let orchestrator = BatchOrchestrator::new(
        runtime.engine(),
        PipelineSpec::new(config.pipeline.clone()),
        work,
        policy,
    )
    .with_batch_config(&config.batch);

    let batch = orchestrator.run(args.streams)?;
    drop(orchestrator);
    print!("{}", render_batch(&batch, &policy, work));
    Ok(batch.passed)
}

fn init_runtime(config: &AppConfig) -> Result<EngineRuntime> {
    EngineRuntime::init(&config.pipeline).context("failed to initialise pipeline engine")
}

fn print_header(config: &AppConfig, policy: &PassPolicy, runtime: &EngineRuntime) {
    let spec = PipelineSpec::new(config.pipeline.clone());
    let pipeline = &config.pipeline;
    println!("Concurrent NVENC capacity test");
    println!(
        "  Engine: {} ({})",
        runtime.engine().name(),
        runtime.backend_version().unwrap_or("unknown version")
    );
    println!(
        "  Encoder: {} {}x{}@{}",
        spec.encoder_element(),
        pipeline.width,
        pipeline.height,
        pipeline.framerate
    );
    println!(
        "  Work per job: {}s of video",
        config.sweep.work_duration.as_secs()
    );
    println!(
        "  Pass policy: {} {}",
        policy,
        policy.bound(config.sweep.work_duration)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_adjusts_current_policy() {
        let policy = override_policy(PolicyConfig::default(), None, Some(1.5));
        assert_eq!(
            policy,
            PolicyConfig::OnTime {
                overhead_factor: 1.5
            }
        );
    }

    #[test]
    fn switching_policy_uses_its_default() {
        let policy = override_policy(PolicyConfig::default(), Some(PolicyArg::MinRate), None);
        assert_eq!(policy, PolicyConfig::MinRate { threshold: 1.0 });
        let policy = override_policy(
            PolicyConfig::MinRate { threshold: 2.0 },
            Some(PolicyArg::MinRate),
            None,
        );
        assert_eq!(policy, PolicyConfig::MinRate { threshold: 2.0 });
    }
}
