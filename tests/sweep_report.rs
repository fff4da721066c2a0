//! ---
//! eb_section: "15-testing"
//! eb_subsection: "integration-tests"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Sweep artifacts produced from scripted engine runs."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use encbench_common::config::{BatchConfig, PipelineConfig};
use encbench_engine::PipelineSpec;
use encbench_harness::report::{render_summary, write_json_report};
use encbench_harness::{
    new_registry, BatchOrchestrator, CapacitySweep, HarnessMetrics, PassPolicy, StopReason,
};
use encbench_testharness::{Script, ScriptedEngine};

#[test]
fn failing_second_batch_produces_artifacts() {
    // Batch 1 takes one script, batch 2 takes the next two: its second job fails.
    let engine = Arc::new(ScriptedEngine::with_scripts(
        Script::finish_after_millis(10),
        [
            Script::finish_after_millis(10),
            Script::finish_after_millis(10),
            Script::Fail {
                after: Duration::from_millis(5),
                message: "NVENC session limit reached".into(),
            },
        ],
    ));
    let policy = PassPolicy::default();
    let work = Duration::from_secs(1);
    let metrics = HarnessMetrics::new(new_registry()).unwrap();
    let orchestrator = BatchOrchestrator::new(
        engine.clone(),
        PipelineSpec::new(PipelineConfig::default()),
        work,
        policy,
    )
    .with_batch_config(&BatchConfig {
        launch_stagger: Duration::from_millis(20),
        poll_interval: Duration::from_millis(5),
    })
    .with_metrics(metrics.clone());

    let report = CapacitySweep::new(orchestrator, vec![1, 2, 4])
        .unwrap()
        .with_cool_down(Duration::ZERO)
        .run()
        .unwrap();
    metrics.set_max_passing(report.max_passing);

    assert_eq!(report.max_passing, 1);
    assert_eq!(report.stop_reason, StopReason::FirstFailure);
    assert_eq!(report.skipped(), &[4]);
    assert_eq!(engine.stats().prepared(), 3);

    let summary = render_summary(&report);
    assert!(summary.contains("Maximum concurrent streams: 1"));

    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("sweep.json");
    write_json_report(&json_path, &report, &policy, work, Utc::now()).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(value["data"]["batches"][1]["failed"], 1);
    assert_eq!(
        value["data"]["batches"][1]["jobs"][1]["error"],
        "NVENC session limit reached"
    );

    let metrics_path = dir.path().join("metrics.prom");
    metrics.write_text(&metrics_path).unwrap();
    let text = std::fs::read_to_string(&metrics_path).unwrap();
    assert!(text.contains("encbench_jobs_total{outcome=\"encoding_error\"} 1"));
    assert!(text.contains("encbench_max_passing_streams 1"));
}
