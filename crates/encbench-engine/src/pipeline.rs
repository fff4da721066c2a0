//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Media pipeline engine abstraction and backends."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Where in the pipeline lifecycle an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    /// The description could not be turned into a running graph.
    Construction,
    /// The graph was running and reported an error.
    Streaming,
}

/// Terminal signal observed on a pipeline's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// End of stream: every buffer was processed.
    Eos,
    Error {
        message: String,
        debug: Option<String>,
        stage: ErrorStage,
    },
}

impl PipelineEvent {
    pub fn streaming_error(message: impl Into<String>) -> Self {
        PipelineEvent::Error {
            message: message.into(),
            debug: None,
            stage: ErrorStage::Streaming,
        }
    }
}

/// Factory turning textual descriptions into pipelines.
pub trait PipelineEngine: Send + Sync + fmt::Debug {
    /// Backend label used in logs.
    fn name(&self) -> &'static str;

    /// Parse `description` into a pipeline that has not started yet.
    fn prepare(&self, description: &str) -> Result<Box<dyn Pipeline>>;
}

/// One exclusively owned pipeline instance.
///
/// Implementations release native handles in `teardown`, which must be
/// idempotent and is also invoked from `Drop`.
pub trait Pipeline: Send {
    fn play(&mut self) -> Result<()>;

    /// Wait up to `timeout` for an end-of-stream or error signal.
    ///
    /// `Ok(None)` means neither arrived within the interval.
    fn poll(&mut self, timeout: Duration) -> Result<Option<PipelineEvent>>;

    fn teardown(&mut self);
}
