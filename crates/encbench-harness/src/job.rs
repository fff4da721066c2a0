//! ---
//! eb_section: "02-benchmark-harness"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Concurrent encode jobs, batch aggregation, and capacity search."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! A single encode job: build, play, poll to a terminal event, publish one record.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use encbench_common::time::realtime_rate;
use encbench_engine::{EngineError, ErrorStage, Pipeline, PipelineEngine, PipelineEvent};
use encbench_logging::{bench_debug, bench_error, bench_info, LogContext};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};

use crate::sink::ResultSink;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The description was rejected or the pipeline could not start.
    StartFailure,
    /// The engine reported an error while media was flowing.
    EncodingError,
    /// A panic or an I/O failure while waiting for the pipeline.
    UnexpectedFault,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::StartFailure => "start_failure",
            FailureKind::EncodingError => "encoding_error",
            FailureKind::UnexpectedFault => "unexpected_fault",
        }
    }
}

impl From<ErrorStage> for FailureKind {
    fn from(stage: ErrorStage) -> Self {
        match stage {
            ErrorStage::Construction => FailureKind::StartFailure,
            ErrorStage::Streaming => FailureKind::EncodingError,
        }
    }
}

/// Outcome of one job. Produced exactly once per runner.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// 1-based, unique within its batch.
    pub job_id: u32,
    pub success: bool,
    #[serde(rename = "elapsed_secs")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    /// Realtime multiple: seconds of media per second of wall time.
    pub rate: f64,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
}

impl JobResult {
    pub fn succeeded(job_id: u32, elapsed: Duration, work: Duration) -> Self {
        Self {
            job_id,
            success: true,
            elapsed,
            rate: realtime_rate(work, elapsed),
            error: None,
            failure: None,
        }
    }

    pub fn failed(
        job_id: u32,
        elapsed: Duration,
        failure: FailureKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            success: false,
            elapsed,
            rate: 0.0,
            error: Some(error.into()),
            failure: Some(failure),
        }
    }
}

/// Owns one concurrent unit of work and publishes its result to the sink.
#[derive(Debug)]
pub struct JobRunner {
    job_id: u32,
    batch_size: u32,
    work: Duration,
    description: String,
    engine: Arc<dyn PipelineEngine>,
    poll_interval: Duration,
    sink: ResultSink,
}

impl JobRunner {
    pub fn new(
        job_id: u32,
        work: Duration,
        description: impl Into<String>,
        engine: Arc<dyn PipelineEngine>,
        sink: ResultSink,
    ) -> Self {
        Self {
            job_id,
            batch_size: 0,
            work,
            description: description.into(),
            engine,
            poll_interval: DEFAULT_POLL_INTERVAL,
            sink,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Run the job to completion, publish its record, and return a copy.
    ///
    /// Panics raised by the engine are caught here and recorded as
    /// [`FailureKind::UnexpectedFault`].
    pub fn run(self) -> JobResult {
        let launched = Instant::now();
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.execute())) {
            Ok(result) => result,
            Err(payload) => JobResult::failed(
                self.job_id,
                launched.elapsed(),
                FailureKind::UnexpectedFault,
                format!("job panicked: {}", panic_message(payload.as_ref())),
            ),
        };

        let ctx = LogContext::new()
            .with_job(self.job_id)
            .with_batch(self.batch_size);
        if result.success {
            bench_info!(
                context = ctx,
                "completed in {:.2}s ({:.2}x realtime)",
                result.elapsed.as_secs_f64(),
                result.rate
            );
        } else {
            bench_error!(
                context = ctx,
                "failed after {:.2}s: {}",
                result.elapsed.as_secs_f64(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        self.sink.publish(result.clone());
        result
    }

    fn execute(&self) -> JobResult {
        let mut pipeline = match self.engine.prepare(&self.description) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                return JobResult::failed(
                    self.job_id,
                    Duration::ZERO,
                    FailureKind::StartFailure,
                    err.to_string(),
                )
            }
        };

        let started = Instant::now();
        if let Err(err) = pipeline.play() {
            pipeline.teardown();
            return JobResult::failed(
                self.job_id,
                started.elapsed(),
                start_error_kind(&err),
                err.to_string(),
            );
        }
        bench_debug!(
            context = LogContext::new().with_job(self.job_id).with_batch(self.batch_size),
            "pipeline playing on {} engine",
            self.engine.name()
        );

        let outcome = self.wait_for_terminal(pipeline.as_mut());
        let elapsed = started.elapsed();
        pipeline.teardown();

        match outcome {
            Ok(PipelineEvent::Eos) => JobResult::succeeded(self.job_id, elapsed, self.work),
            // The description never produced a running pipeline.
            Ok(PipelineEvent::Error {
                message,
                stage: ErrorStage::Construction,
                ..
            }) => JobResult::failed(
                self.job_id,
                Duration::ZERO,
                FailureKind::StartFailure,
                message,
            ),
            Ok(PipelineEvent::Error { message, stage, .. }) => {
                JobResult::failed(self.job_id, elapsed, stage.into(), message)
            }
            Err(err) => JobResult::failed(
                self.job_id,
                elapsed,
                FailureKind::UnexpectedFault,
                err.to_string(),
            ),
        }
    }

    /// Poll until the pipeline reports end of stream or an error. There is no overall deadline.
    fn wait_for_terminal(
        &self,
        pipeline: &mut dyn Pipeline,
    ) -> Result<PipelineEvent, EngineError> {
        loop {
            if let Some(event) = pipeline.poll(self.poll_interval)? {
                return Ok(event);
            }
        }
    }
}

fn start_error_kind(err: &EngineError) -> FailureKind {
    if err.is_start_failure() {
        FailureKind::StartFailure
    } else {
        FailureKind::UnexpectedFault
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use encbench_testharness::{Gate, Script, ScriptedEngine};

    use super::*;

    const WORK: Duration = Duration::from_secs(20);

    fn run_script(script: Script) -> (JobResult, ResultSink, Arc<ScriptedEngine>) {
        let engine = Arc::new(ScriptedEngine::new(script));
        let sink = ResultSink::new();
        let result = JobRunner::new(1, WORK, "stub", engine.clone(), sink.clone())
            .with_poll_interval(Duration::from_millis(5))
            .run();
        (result, sink, engine)
    }

    #[test]
    fn success_records_rate() {
        let (result, sink, engine) = run_script(Script::finish_after_millis(20));
        assert!(result.success);
        assert!(result.elapsed >= Duration::from_millis(20));
        assert!(result.rate > 1.0);
        assert_eq!(sink.len(), 1);
        assert_eq!(engine.stats().torn_down(), 1);
    }

    #[test]
    fn streaming_error_is_encoding_error() {
        let (result, _, engine) = run_script(Script::Fail {
            after: Duration::from_millis(5),
            message: "Could not open encoder".into(),
        });
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::EncodingError));
        assert_eq!(result.error.as_deref(), Some("Could not open encoder"));
        assert_eq!(result.rate, 0.0);
        assert_eq!(engine.stats().torn_down(), 1);
    }

    #[test]
    fn rejected_description_has_zero_elapsed() {
        let (result, sink, _) = run_script(Script::RejectDescription("no element".into()));
        assert_eq!(result.failure, Some(FailureKind::StartFailure));
        assert_eq!(result.elapsed, Duration::ZERO);
        assert_eq!(result.rate, 0.0);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn late_description_error_has_zero_elapsed() {
        let (result, sink, engine) = run_script(Script::LateParseError {
            after: Duration::from_millis(10),
            message: "no element \"nvh264enc\"".into(),
        });
        assert_eq!(result.failure, Some(FailureKind::StartFailure));
        assert_eq!(result.elapsed, Duration::ZERO);
        assert_eq!(result.rate, 0.0);
        assert_eq!(sink.len(), 1);
        assert_eq!(engine.stats().torn_down(), 1);
    }

    #[test]
    fn start_failure_releases_pipeline() {
        let (result, _, engine) = run_script(Script::RejectStart("busy".into()));
        assert_eq!(result.failure, Some(FailureKind::StartFailure));
        assert_eq!(engine.stats().torn_down(), 1);
    }

    #[test]
    fn panic_is_captured_as_fault() {
        let (result, sink, engine) = run_script(Script::PanicOnPoll);
        assert_eq!(result.failure, Some(FailureKind::UnexpectedFault));
        assert!(result.error.unwrap().contains("scripted pipeline panicked"));
        assert_eq!(sink.len(), 1);
        assert_eq!(engine.stats().torn_down(), 1);
    }

    #[test]
    fn poll_fault_is_unexpected() {
        let (result, _, _) = run_script(Script::PollFault);
        assert_eq!(result.failure, Some(FailureKind::UnexpectedFault));
    }

    #[test]
    fn silent_pipeline_keeps_polling() {
        let gate = Gate::new();
        let engine = Arc::new(ScriptedEngine::new(Script::Gated(gate.clone())));
        let stats = engine.stats();
        let sink = ResultSink::new();
        let runner = JobRunner::new(1, WORK, "stub", engine, sink.clone())
            .with_poll_interval(Duration::from_millis(5));
        let handle = thread::spawn(move || runner.run());

        thread::sleep(Duration::from_millis(100));
        assert!(sink.is_empty());
        assert!(stats.polls() > 1);

        gate.open();
        let result = handle.join().unwrap();
        assert!(result.success);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn failure_kind_from_stage() {
        assert_eq!(
            FailureKind::from(ErrorStage::Construction),
            FailureKind::StartFailure
        );
        assert_eq!(
            FailureKind::from(ErrorStage::Streaming),
            FailureKind::EncodingError
        );
    }
}
