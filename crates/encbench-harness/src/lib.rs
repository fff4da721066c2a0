//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Concurrent encode jobs, batch aggregation, and capacity search."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! Capacity benchmarking for concurrent encode pipelines.
//!
//! A [`CapacitySweep`] drives a [`BatchOrchestrator`] over ascending batch
//! sizes. Each batch runs one [`JobRunner`] thread per job; runners publish
//! their [`JobResult`] to a shared [`ResultSink`], and the orchestrator
//! folds them into a [`BatchResult`] judged by a [`PassPolicy`].

pub mod batch;
pub mod error;
pub mod job;
pub mod metrics;
pub mod policy;
pub mod report;
pub mod sink;
pub mod stats;
pub mod sweep;

pub use batch::{BatchExecutor, BatchOrchestrator, BatchResult};
pub use error::{HarnessError, Result};
pub use job::{FailureKind, JobResult, JobRunner};
pub use metrics::{new_registry, HarnessMetrics, SharedRegistry};
pub use policy::PassPolicy;
pub use sink::ResultSink;
pub use stats::Stats;
pub use sweep::{CapacitySweep, StopReason, SweepReport, SweepState};
