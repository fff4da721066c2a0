//! ---
//! eb_section: "15-testing"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Scripted pipeline engines for harness tests."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! Pipeline engines whose behaviour is scripted instead of driven by GStreamer.
//!
//! [`ScriptedEngine`] hands out one [`Script`] per prepared pipeline.
//! [`SessionLimitedEngine`] rejects starts beyond a fixed number of concurrently
//! playing pipelines, which mimics an encoder with a session cap.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use encbench_engine::{EngineError, ErrorStage, Pipeline, PipelineEngine, PipelineEvent, Result};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// A latch that holds gated pipelines until it is opened.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (open, signal) = &*self.inner;
        *open.lock() = true;
        signal.notify_all();
    }

    /// Wait up to `timeout` for the gate to open.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (open, signal) = &*self.inner;
        let mut guard = open.lock();
        if !*guard {
            signal.wait_for(&mut guard, timeout);
        }
        *guard
    }
}

/// Behaviour of one scripted pipeline.
#[derive(Debug, Clone)]
pub enum Script {
    /// Reach end of stream once `after` has passed since `play`.
    Finish { after: Duration },
    /// Report a streaming error once `after` has passed since `play`.
    Fail { after: Duration, message: String },
    /// Report a description error from the bus once `after` has passed since `play`.
    LateParseError { after: Duration, message: String },
    /// Refuse the description in `prepare`.
    RejectDescription(String),
    /// Fail in `play`.
    RejectStart(String),
    /// Panic on the first poll.
    PanicOnPoll,
    /// Return an I/O error from the first poll.
    PollFault,
    /// Stay silent until the gate opens, then reach end of stream.
    Gated(Gate),
}

impl Script {
    pub fn finish_after_millis(millis: u64) -> Self {
        Script::Finish {
            after: Duration::from_millis(millis),
        }
    }
}

/// Shared counters the tests inspect after a batch.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub prepared: AtomicUsize,
    pub polls: AtomicUsize,
    pub torn_down: AtomicUsize,
}

impl EngineStats {
    pub fn prepared(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn torn_down(&self) -> usize {
        self.torn_down.load(Ordering::SeqCst)
    }
}

/// Engine that pops a script per `prepare` call and repeats `fallback` once the queue is empty.
#[derive(Debug)]
pub struct ScriptedEngine {
    queue: Mutex<VecDeque<Script>>,
    fallback: Script,
    stats: Arc<EngineStats>,
}

impl ScriptedEngine {
    pub fn new(fallback: Script) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            stats: Arc::new(EngineStats::default()),
        }
    }

    pub fn with_scripts(fallback: Script, scripts: impl IntoIterator<Item = Script>) -> Self {
        let engine = Self::new(fallback);
        engine.queue.lock().extend(scripts);
        engine
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }
}

impl PipelineEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn prepare(&self, description: &str) -> Result<Box<dyn Pipeline>> {
        self.stats.prepared.fetch_add(1, Ordering::SeqCst);
        let script = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        debug!(?script, %description, "scripted pipeline prepared");
        if let Script::RejectDescription(message) = &script {
            return Err(EngineError::Construct(message.clone()));
        }
        Ok(Box::new(ScriptedPipeline {
            script,
            started: None,
            stats: Arc::clone(&self.stats),
            released: false,
            on_release: None,
        }))
    }
}

struct ScriptedPipeline {
    script: Script,
    started: Option<Instant>,
    stats: Arc<EngineStats>,
    released: bool,
    on_release: Option<Arc<AtomicUsize>>,
}

impl ScriptedPipeline {
    /// Sleep until `after` has passed since `play`, at most `timeout`.
    fn wait_until(&self, after: Duration, timeout: Duration) -> bool {
        let elapsed = self.started.map(|at| at.elapsed()).unwrap_or_default();
        if elapsed >= after {
            return true;
        }
        let remaining = after - elapsed;
        thread::sleep(remaining.min(timeout));
        remaining <= timeout
    }
}

impl Pipeline for ScriptedPipeline {
    fn play(&mut self) -> Result<()> {
        if let Script::RejectStart(message) = &self.script {
            return Err(EngineError::Start(message.clone()));
        }
        self.started = Some(Instant::now());
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<PipelineEvent>> {
        self.stats.polls.fetch_add(1, Ordering::SeqCst);
        if self.started.is_none() {
            return Err(EngineError::Start("pipeline is not playing".into()));
        }
        match &self.script {
            Script::Finish { after } => Ok(self
                .wait_until(*after, timeout)
                .then_some(PipelineEvent::Eos)),
            Script::Fail { after, message } => Ok(self
                .wait_until(*after, timeout)
                .then(|| PipelineEvent::streaming_error(message.clone()))),
            Script::LateParseError { after, message } => Ok(self
                .wait_until(*after, timeout)
                .then(|| PipelineEvent::Error {
                    message: message.clone(),
                    debug: None,
                    stage: ErrorStage::Construction,
                })),
            Script::PanicOnPoll => panic!("scripted pipeline panicked"),
            Script::PollFault => Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "event stream closed",
            ))),
            Script::Gated(gate) => Ok(gate.wait(timeout).then_some(PipelineEvent::Eos)),
            Script::RejectDescription(_) | Script::RejectStart(_) => Ok(None),
        }
    }

    fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stats.torn_down.fetch_add(1, Ordering::SeqCst);
        if let Some(active) = self.on_release.take() {
            active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ScriptedPipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Engine that allows at most `limit` pipelines to play at once.
///
/// Each admitted pipeline plays for `hold` and then reaches end of stream.
#[derive(Debug)]
pub struct SessionLimitedEngine {
    limit: usize,
    hold: Duration,
    active: Arc<AtomicUsize>,
    stats: Arc<EngineStats>,
}

impl SessionLimitedEngine {
    pub fn new(limit: usize, hold: Duration) -> Self {
        Self {
            limit,
            hold,
            active: Arc::new(AtomicUsize::new(0)),
            stats: Arc::new(EngineStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl PipelineEngine for SessionLimitedEngine {
    fn name(&self) -> &'static str {
        "session-limited"
    }

    fn prepare(&self, _description: &str) -> Result<Box<dyn Pipeline>> {
        self.stats.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SessionPipeline {
            inner: ScriptedPipeline {
                script: Script::Finish { after: self.hold },
                started: None,
                stats: Arc::clone(&self.stats),
                released: false,
                on_release: None,
            },
            limit: self.limit,
            active: Arc::clone(&self.active),
        }))
    }
}

struct SessionPipeline {
    inner: ScriptedPipeline,
    limit: usize,
    active: Arc<AtomicUsize>,
}

impl Pipeline for SessionPipeline {
    fn play(&mut self) -> Result<()> {
        let playing = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        if playing > self.limit {
            self.active.fetch_sub(1, Ordering::SeqCst);
            return Err(EngineError::Start(format!(
                "no encoder session available ({} already active)",
                self.limit
            )));
        }
        self.inner.on_release = Some(Arc::clone(&self.active));
        self.inner.play()
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<PipelineEvent>> {
        self.inner.poll(timeout)
    }

    fn teardown(&mut self) {
        self.inner.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_then_fallback() {
        let engine = ScriptedEngine::with_scripts(
            Script::finish_after_millis(0),
            [Script::RejectDescription("bad".into())],
        );
        assert!(engine.prepare("x").is_err());
        let mut pipeline = engine.prepare("x").unwrap();
        pipeline.play().unwrap();
        assert_eq!(
            pipeline.poll(Duration::from_millis(1)).unwrap(),
            Some(PipelineEvent::Eos)
        );
        drop(pipeline);
        assert_eq!(engine.stats().torn_down(), 1);
    }

    #[test]
    fn session_limit_rejects_overflow() {
        let engine = SessionLimitedEngine::new(1, Duration::from_secs(5));
        let mut first = engine.prepare("x").unwrap();
        first.play().unwrap();
        let mut second = engine.prepare("x").unwrap();
        assert!(second.play().unwrap_err().is_start_failure());
        assert_eq!(engine.active(), 1);
        first.teardown();
        assert_eq!(engine.active(), 0);
    }

    #[test]
    fn gate_releases_waiters() {
        let gate = Gate::new();
        assert!(!gate.wait(Duration::from_millis(5)));
        gate.open();
        assert!(gate.wait(Duration::from_millis(5)));
    }
}
