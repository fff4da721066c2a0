//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "integration-tests"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "End-to-end sweeps over scripted and subprocess engines."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use encbench_common::config::{BatchConfig, PipelineConfig};
use encbench_engine::PipelineSpec;
use encbench_harness::{
    new_registry, BatchOrchestrator, CapacitySweep, FailureKind, HarnessMetrics, JobRunner,
    PassPolicy, ResultSink, StopReason,
};
use encbench_testharness::SessionLimitedEngine;

fn fast_batches() -> BatchConfig {
    BatchConfig {
        launch_stagger: Duration::from_millis(5),
        poll_interval: Duration::from_millis(5),
    }
}

#[test]
fn sweep_finds_session_ceiling() {
    encbench_logging::init();
    let engine = Arc::new(SessionLimitedEngine::new(2, Duration::from_millis(150)));
    let registry = new_registry();
    let metrics = HarnessMetrics::new(registry).unwrap();
    let orchestrator = BatchOrchestrator::new(
        engine.clone(),
        PipelineSpec::new(PipelineConfig::default()),
        Duration::from_secs(1),
        PassPolicy::MinRate { threshold: 1.0 },
    )
    .with_batch_config(&fast_batches())
    .with_metrics(metrics.clone());

    let mut sweep = CapacitySweep::new(orchestrator, vec![1, 2, 4, 8])
        .unwrap()
        .with_cool_down(Duration::ZERO);
    let report = sweep.run().unwrap();
    metrics.set_max_passing(report.max_passing);

    assert_eq!(report.max_passing, 2);
    assert_eq!(report.stop_reason, StopReason::FirstFailure);
    assert_eq!(report.batches.len(), 3);
    assert_eq!(report.skipped(), &[8]);

    let overloaded = &report.batches[2];
    assert_eq!(overloaded.successful + overloaded.failed, 4);
    assert_eq!(overloaded.failed, 2);
    assert!(overloaded
        .jobs
        .iter()
        .filter(|job| !job.success)
        .all(|job| job.failure == Some(FailureKind::StartFailure)));

    // Every admitted session was released.
    assert_eq!(engine.active(), 0);
    assert_eq!(engine.stats().prepared(), 1 + 2 + 4);
    assert_eq!(engine.stats().torn_down(), 1 + 2 + 4);

    let text = metrics.encode_text().unwrap();
    assert!(text.contains("encbench_batches_total{status=\"pass\"} 2"));
    assert!(text.contains("encbench_max_passing_streams 2"));
}

#[cfg(unix)]
#[test]
fn launch_engine_runs_generated_description() {
    use std::os::unix::fs::PermissionsExt;

    use encbench_engine::LaunchEngine;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("gst-launch-1.0");
    let seen = dir.path().join("argv");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"$@\" > {}\nsleep 0.1\nexit 0\n",
            seen.display()
        ),
    )
    .unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();

    let engine = Arc::new(LaunchEngine::new(&script));
    let orchestrator = BatchOrchestrator::new(
        engine,
        PipelineSpec::new(PipelineConfig::default()),
        Duration::from_secs(2),
        PassPolicy::default(),
    )
    .with_batch_config(&fast_batches());

    let batch = orchestrator.run(1).unwrap();
    assert!(batch.passed, "{batch:?}");
    assert!(batch.jobs[0].rate > 1.0);

    let argv = std::fs::read_to_string(&seen).unwrap();
    assert!(argv.starts_with("-q videotestsrc num-buffers=48 "));
    assert!(argv.contains("nvh264enc rc-mode=cbr bitrate=5000"));
}

#[cfg(unix)]
#[test]
fn quick_exit_is_timed_below_poll_interval() {
    use std::os::unix::fs::PermissionsExt;

    use encbench_engine::LaunchEngine;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("gst-launch-1.0");
    std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();

    let interval = Duration::from_millis(800);
    let result = JobRunner::new(
        1,
        Duration::from_secs(2),
        "videotestsrc ! fakesink",
        Arc::new(LaunchEngine::new(&script)),
        ResultSink::new(),
    )
    .with_poll_interval(interval)
    .run();

    assert!(result.success, "{result:?}");
    assert!(result.elapsed < interval / 2, "elapsed {:?}", result.elapsed);
    assert!(result.rate > 5.0);
}
