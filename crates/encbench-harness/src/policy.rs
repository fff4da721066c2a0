//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Concurrent encode jobs, batch aggregation, and capacity search."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use encbench_common::config::PolicyConfig;
use serde::Serialize;

use crate::error::{HarnessError, Result};
use crate::job::JobResult;

/// Threshold every successful job of a batch must meet for the batch to pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PassPolicy {
    OnTime { overhead_factor: f64 },
    MinRate { threshold: f64 },
}

impl PassPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            PassPolicy::OnTime { .. } => "on-time",
            PassPolicy::MinRate { .. } => "min-rate",
        }
    }

    /// Whether `job` satisfies the policy for `work` seconds of media.
    ///
    /// Failed jobs never satisfy it.
    pub fn admits(&self, job: &JobResult, work: Duration) -> bool {
        if !job.success {
            return false;
        }
        match *self {
            PassPolicy::OnTime { overhead_factor } => {
                job.elapsed.as_secs_f64() <= work.as_secs_f64() * overhead_factor
            }
            PassPolicy::MinRate { threshold } => job.rate >= threshold,
        }
    }

    /// Human-readable bound for `work` seconds of media.
    pub fn bound(&self, work: Duration) -> String {
        match *self {
            PassPolicy::OnTime { overhead_factor } => {
                format!("<= {:.1}s", work.as_secs_f64() * overhead_factor)
            }
            PassPolicy::MinRate { threshold } => format!(">= {:.2}x", threshold),
        }
    }
}

impl Default for PassPolicy {
    fn default() -> Self {
        PassPolicy::OnTime {
            overhead_factor: 1.1,
        }
    }
}

impl TryFrom<PolicyConfig> for PassPolicy {
    type Error = HarnessError;

    fn try_from(config: PolicyConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|err| HarnessError::InvalidPolicy(err.to_string()))?;
        Ok(match config {
            PolicyConfig::OnTime { overhead_factor } => PassPolicy::OnTime { overhead_factor },
            PolicyConfig::MinRate { threshold } => PassPolicy::MinRate { threshold },
        })
    }
}

impl fmt::Display for PassPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassPolicy::OnTime { overhead_factor } => {
                write!(f, "on-time (x{overhead_factor})")
            }
            PassPolicy::MinRate { threshold } => write!(f, "min-rate ({threshold}x)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FailureKind;

    const WORK: Duration = Duration::from_secs(20);

    #[test]
    fn on_time_bound_is_inclusive() {
        let policy = PassPolicy::default();
        let on_edge = JobResult::succeeded(1, Duration::from_millis(22_000), WORK);
        let late = JobResult::succeeded(2, Duration::from_millis(22_001), WORK);
        assert!(policy.admits(&on_edge, WORK));
        assert!(!policy.admits(&late, WORK));
    }

    #[test]
    fn min_rate_bound_is_inclusive() {
        let policy = PassPolicy::MinRate { threshold: 1.0 };
        let realtime = JobResult::succeeded(1, WORK, WORK);
        let slow = JobResult::succeeded(2, Duration::from_secs(21), WORK);
        assert!(policy.admits(&realtime, WORK));
        assert!(!policy.admits(&slow, WORK));
    }

    #[test]
    fn failed_jobs_never_pass() {
        let failed = JobResult::failed(1, Duration::ZERO, FailureKind::StartFailure, "x");
        assert!(!PassPolicy::default().admits(&failed, WORK));
    }

    #[test]
    fn rejects_invalid_config() {
        let err = PassPolicy::try_from(PolicyConfig::MinRate { threshold: -1.0 }).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPolicy(_)));
        assert_eq!(
            PassPolicy::try_from(PolicyConfig::default()).unwrap(),
            PassPolicy::default()
        );
    }
}
