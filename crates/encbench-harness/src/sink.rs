//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Concurrent encode jobs, batch aggregation, and capacity search."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::Mutex;

use crate::job::JobResult;

/// Thread-safe collector shared by every job runner of a batch.
///
/// Appends may arrive in any order; callers sort after [`ResultSink::drain`].
#[derive(Debug, Clone, Default)]
pub struct ResultSink {
    inner: Arc<Mutex<Vec<JobResult>>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, result: JobResult) {
        self.inner.lock().push(result);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Take every collected record, leaving the sink empty.
    pub fn drain(&self) -> Vec<JobResult> {
        std::mem::take(&mut *self.inner.lock())
    }
}
