//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Concurrent encode jobs, batch aggregation, and capacity search."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("a batch must request at least one job")]
    EmptyBatch,
    #[error("invalid sweep candidates: {0}")]
    InvalidCandidates(String),
    #[error("invalid pass policy: {0}")]
    InvalidPolicy(String),
    #[error("sweep already ran; create a new sweep to measure again")]
    SweepFinished,
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
