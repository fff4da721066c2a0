//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Concurrent encode jobs, batch aggregation, and capacity search."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! Text tables for stdout and the JSON sweep artifact.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::batch::BatchResult;
use crate::error::Result;
use crate::policy::PassPolicy;
use crate::sweep::SweepReport;

/// Printed error descriptions are cut to this many characters.
pub const ERROR_DISPLAY_CHARS: usize = 100;

pub fn truncate_error(error: &str) -> String {
    error.chars().take(ERROR_DISPLAY_CHARS).collect()
}

pub fn status_label(passed: bool) -> &'static str {
    if passed {
        "✓ PASS"
    } else {
        "✗ FAIL"
    }
}

/// Per-batch block printed after each batch finishes.
pub fn render_batch(batch: &BatchResult, policy: &PassPolicy, work: Duration) -> String {
    let mut out = String::new();
    let n = batch.requested;
    let _ = writeln!(out, "\nResults for {n} concurrent streams:");
    let _ = writeln!(out, "  Successful: {}/{n}", batch.successful);
    let _ = writeln!(out, "  Failed: {}/{n}", batch.failed);
    if batch.successful > 0 {
        let _ = writeln!(
            out,
            "  Time: avg {:.2}s, min {:.2}s, max {:.2}s",
            batch.elapsed.avg, batch.elapsed.min, batch.elapsed.max
        );
        let _ = writeln!(
            out,
            "  Rate: avg {:.2}x, min {:.2}x, max {:.2}x",
            batch.rate.avg, batch.rate.min, batch.rate.max
        );
    }
    let _ = writeln!(out, "  Wall clock: {:.2}s", batch.wall_clock.as_secs_f64());
    let _ = writeln!(
        out,
        "  Policy: {} {}",
        policy.label(),
        policy.bound(work)
    );
    let _ = writeln!(out, "  Status: {}", status_label(batch.passed));
    if batch.has_failures() {
        let _ = writeln!(out, "  Failed streams: {:?}", batch.failed_ids());
        if let Some(error) = batch.first_error() {
            let _ = writeln!(out, "  First error: {}", truncate_error(error));
        }
    }
    out
}

/// Summary table over every executed candidate.
pub fn render_summary(report: &SweepReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(78);
    let _ = writeln!(out, "\n{rule}\nSUMMARY\n{rule}");
    let _ = writeln!(
        out,
        "{:>8} {:>9} {:>10} {:>10} {:>10} {:>10}  {}",
        "Streams", "Success", "Avg Time", "Max Time", "Avg Rate", "Min Rate", "Status"
    );
    let _ = writeln!(out, "{}", "-".repeat(78));
    for batch in &report.batches {
        let _ = writeln!(
            out,
            "{:>8} {:>9} {:>9.2}s {:>9.2}s {:>9.2}x {:>9.2}x  {}",
            batch.requested,
            format!("{}/{}", batch.successful, batch.requested),
            batch.elapsed.avg,
            batch.elapsed.max,
            batch.rate.avg,
            batch.rate.min,
            status_label(batch.passed)
        );
    }
    for skipped in report.skipped() {
        let _ = writeln!(out, "{:>8} {:>9}", skipped, "skipped");
    }
    let _ = writeln!(out, "{rule}");
    if report.succeeded() {
        let _ = writeln!(
            out,
            "Maximum concurrent streams: {}",
            report.max_passing
        );
    } else {
        let _ = writeln!(out, "No batch size passed");
    }
    out
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a, T: Serialize> {
    timestamp: String,
    harness_version: &'static str,
    policy: &'a PassPolicy,
    work_secs: f64,
    schema: serde_json::Value,
    data: &'a T,
}

/// Write the sweep report as pretty JSON wrapped in a timestamped envelope.
pub fn write_json_report(
    path: impl AsRef<Path>,
    report: &SweepReport,
    policy: &PassPolicy,
    work: Duration,
    timestamp: DateTime<Utc>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let envelope = ReportEnvelope {
        timestamp: timestamp.to_rfc3339(),
        harness_version: env!("CARGO_PKG_VERSION"),
        policy,
        work_secs: work.as_secs_f64(),
        schema: sweep_schema(),
        data: report,
    };
    fs::write(path, serde_json::to_string_pretty(&envelope)?)?;
    info!(path = %path.display(), "sweep report written");
    Ok(())
}

fn sweep_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "SweepReport",
        "type": "object",
        "properties": {
            "candidates": {"type": "array", "items": {"type": "integer", "minimum": 1}},
            "max_passing": {"type": "integer", "minimum": 0},
            "stop_reason": {"enum": ["exhausted", "first_failure"]},
            "batches": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "requested": {"type": "integer"},
                        "successful": {"type": "integer"},
                        "failed": {"type": "integer"},
                        "passed": {"type": "boolean"},
                        "wall_clock_secs": {"type": "number"},
                        "jobs": {"type": "array"}
                    },
                    "required": ["requested", "successful", "failed", "passed"]
                }
            }
        },
        "required": ["candidates", "max_passing", "stop_reason", "batches"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FailureKind, JobResult};
    use crate::sweep::StopReason;

    const WORK: Duration = Duration::from_secs(20);

    fn sample_report() -> SweepReport {
        let policy = PassPolicy::default();
        let passing = BatchResult::from_jobs(
            1,
            vec![JobResult::succeeded(1, Duration::from_secs(20), WORK)],
            Duration::from_secs(20),
            &policy,
            WORK,
        );
        let failing = BatchResult::from_jobs(
            2,
            vec![
                JobResult::succeeded(1, Duration::from_secs(20), WORK),
                JobResult::failed(2, Duration::ZERO, FailureKind::StartFailure, "x".repeat(150)),
            ],
            Duration::from_secs(20),
            &policy,
            WORK,
        );
        SweepReport {
            candidates: vec![1, 2, 4],
            batches: vec![passing, failing],
            max_passing: 1,
            stop_reason: StopReason::FirstFailure,
        }
    }

    #[test]
    fn batch_block_truncates_error() {
        let report = sample_report();
        let text = render_batch(&report.batches[1], &PassPolicy::default(), WORK);
        assert!(text.contains("Successful: 1/2"));
        assert!(text.contains("Failed streams: [2]"));
        let line = text
            .lines()
            .find(|line| line.contains("First error:"))
            .unwrap();
        assert_eq!(line.trim_start_matches("  First error: ").len(), 100);
    }

    #[test]
    fn summary_lists_skipped_and_maximum() {
        let text = render_summary(&sample_report());
        assert!(text.contains("skipped"));
        assert!(text.contains("Maximum concurrent streams: 1"));
    }

    #[test]
    fn json_report_is_enveloped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/sweep.json");
        write_json_report(
            &path,
            &sample_report(),
            &PassPolicy::default(),
            WORK,
            Utc::now(),
        )
        .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["data"]["max_passing"], 1);
        assert_eq!(value["data"]["stop_reason"], "first_failure");
        assert_eq!(value["policy"]["kind"], "on-time");
        assert_eq!(value["data"]["batches"][1]["jobs"][1]["failure"], "start_failure");
        assert_eq!(value["data"]["batches"][0]["jobs"][0]["elapsed_secs"], 20.0);
    }
}
