//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Media pipeline engine abstraction and backends."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! Pipeline backend that runs each description in its own `gst-launch-1.0` process.
//!
//! `gst-launch-1.0` exits with status 0 once the pipeline reaches end of
//! stream and with a non-zero status after an error, so the child exit
//! status stands in for the bus messages of the native backend.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::pipeline::{ErrorStage, Pipeline, PipelineEngine, PipelineEvent};

/// Granularity of child exit checks within one poll interval.
const EXIT_CHECK_SLICE: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct LaunchEngine {
    launcher: PathBuf,
}

impl LaunchEngine {
    pub fn new(launcher: impl Into<PathBuf>) -> Self {
        Self {
            launcher: launcher.into(),
        }
    }

    pub fn launcher(&self) -> &Path {
        &self.launcher
    }

    /// Run `<launcher> --version` and return its first output line.
    pub fn probe_version(&self) -> Result<String> {
        let output = Command::new(&self.launcher)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| EngineError::LauncherUnavailable {
                launcher: self.launcher.display().to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(EngineError::Init(format!(
                "{} --version exited with {}",
                self.launcher.display(),
                output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("unknown version")
            .trim()
            .to_owned())
    }
}

impl PipelineEngine for LaunchEngine {
    fn name(&self) -> &'static str {
        "launch"
    }

    fn prepare(&self, description: &str) -> Result<Box<dyn Pipeline>> {
        let tokens: Vec<String> = description.split_whitespace().map(str::to_owned).collect();
        if tokens.is_empty() {
            return Err(EngineError::Construct("empty pipeline description".into()));
        }
        Ok(Box::new(LaunchPipeline {
            launcher: self.launcher.clone(),
            tokens,
            child: None,
            stderr: None,
        }))
    }
}

#[derive(Debug)]
pub struct LaunchPipeline {
    launcher: PathBuf,
    tokens: Vec<String>,
    child: Option<Child>,
    stderr: Option<JoinHandle<String>>,
}

impl LaunchPipeline {
    fn exit_event(&mut self, status: ExitStatus) -> PipelineEvent {
        let stderr = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        if status.success() {
            return PipelineEvent::Eos;
        }
        let (message, stage) = match diagnostic(&stderr) {
            Some(found) => found,
            None => (
                format!("{} exited with {}", self.launcher.display(), status),
                ErrorStage::Streaming,
            ),
        };
        let debug = if stderr.trim().is_empty() {
            None
        } else {
            Some(stderr)
        };
        PipelineEvent::Error {
            message,
            debug,
            stage,
        }
    }
}

impl Pipeline for LaunchPipeline {
    fn play(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Err(EngineError::Start("pipeline already playing".into()));
        }
        let mut child = Command::new(&self.launcher)
            .arg("-q")
            .args(&self.tokens)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    EngineError::LauncherUnavailable {
                        launcher: self.launcher.display().to_string(),
                        source,
                    }
                }
                _ => EngineError::Start(source.to_string()),
            })?;
        debug!(pid = child.id(), launcher = %self.launcher.display(), "pipeline process spawned");

        // Drain stderr on a side thread so a chatty child never blocks on a full pipe.
        self.stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buffer = String::new();
                let _ = pipe.read_to_string(&mut buffer);
                buffer
            })
        });
        self.child = Some(child);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<PipelineEvent>> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| EngineError::Start("pipeline is not playing".into()))?;
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(self.exit_event(status)));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            thread::sleep(remaining.min(EXIT_CHECK_SLICE));
        }
    }

    fn teardown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                if let Err(err) = child.kill() {
                    warn!(pid = child.id(), error = %err, "failed to kill pipeline process");
                }
            }
        }
        let _ = child.wait();
        if let Some(reader) = self.stderr.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for LaunchPipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Extract the human-readable error from `gst-launch-1.0` stderr.
///
/// Description errors (`WARNING: erroneous pipeline: ...`) map to
/// [`ErrorStage::Construction`]; `ERROR: from element ...: msg` lines map to
/// [`ErrorStage::Streaming`].
pub fn diagnostic(stderr: &str) -> Option<(String, ErrorStage)> {
    let lines = || stderr.lines().map(str::trim).filter(|line| !line.is_empty());

    if let Some(line) = lines().find(|line| line.contains("erroneous pipeline")) {
        let message = line
            .split_once("erroneous pipeline:")
            .map(|(_, rest)| rest.trim())
            .filter(|rest| !rest.is_empty())
            .unwrap_or(line);
        return Some((message.to_owned(), ErrorStage::Construction));
    }

    if let Some(line) = lines().find(|line| line.starts_with("ERROR:")) {
        let message = match line.strip_prefix("ERROR: from element ") {
            Some(rest) => rest
                .split_once(": ")
                .map(|(_, message)| message)
                .unwrap_or(rest),
            None => line.trim_start_matches("ERROR:").trim(),
        };
        return Some((message.to_owned(), ErrorStage::Streaming));
    }

    lines()
        .last()
        .map(|line| (line.to_owned(), ErrorStage::Streaming))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erroneous_pipeline_is_construction_error() {
        let stderr = "WARNING: erroneous pipeline: no element \"nvh264enc\"\n";
        let (message, stage) = diagnostic(stderr).unwrap();
        assert_eq!(message, "no element \"nvh264enc\"");
        assert_eq!(stage, ErrorStage::Construction);
    }

    #[test]
    fn element_error_keeps_message_only() {
        let stderr = "ERROR: from element /GstPipeline:pipeline0/GstNvH264Enc:nvh264enc0: Could not open encoder\n\
                      Additional debug info:\n\
                      ../sys/nvcodec/gstnvbaseenc.c(1620): gst_nv_base_enc_set_format ()\n\
                      ERROR: pipeline doesn't want to preroll.\n";
        let (message, stage) = diagnostic(stderr).unwrap();
        assert_eq!(message, "Could not open encoder");
        assert_eq!(stage, ErrorStage::Streaming);
    }

    #[test]
    fn falls_back_to_last_line() {
        let (message, _) = diagnostic("something odd\nSegmentation fault\n\n").unwrap();
        assert_eq!(message, "Segmentation fault");
        assert!(diagnostic("  \n").is_none());
    }

    #[test]
    fn empty_description_is_rejected() {
        let engine = LaunchEngine::new("gst-launch-1.0");
        match engine.prepare("   ") {
            Err(EngineError::Construct(_)) => {}
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("empty description accepted"),
        }
    }

    #[test]
    fn missing_launcher_is_start_failure() {
        let engine = LaunchEngine::new("/nonexistent/encbench-gst-launch");
        let mut pipeline = engine.prepare("videotestsrc ! fakesink").unwrap();
        let err = pipeline.play().unwrap_err();
        assert!(err.is_start_failure());
    }

    #[test]
    fn poll_before_play_errors() {
        let engine = LaunchEngine::new("gst-launch-1.0");
        let mut pipeline = engine.prepare("videotestsrc ! fakesink").unwrap();
        assert!(pipeline.poll(Duration::from_millis(1)).is_err());
        pipeline.teardown();
        pipeline.teardown();
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_maps_to_events() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-launch.sh");
        // The first argument is always `-q`; the next token selects the outcome.
        std::fs::write(
            &script,
            "#!/bin/sh\nshift\nif [ \"$1\" = fail ]; then echo 'ERROR: from element /GstPipeline:pipeline0/X:x0: boom' >&2; exit 1; fi\nexit 0\n",
        )
        .unwrap();
        make_executable(&script);

        let engine = LaunchEngine::new(&script);
        let mut good = engine.prepare("pass").unwrap();
        good.play().unwrap();
        assert_eq!(wait_event(good.as_mut()), PipelineEvent::Eos);

        let mut bad = engine.prepare("fail").unwrap();
        bad.play().unwrap();
        match wait_event(bad.as_mut()) {
            PipelineEvent::Error { message, stage, .. } => {
                assert_eq!(message, "boom");
                assert_eq!(stage, ErrorStage::Streaming);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn exit_is_noticed_before_interval_ends() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("quick-launch.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        make_executable(&script);

        let engine = LaunchEngine::new(&script);
        let mut pipeline = engine.prepare("videotestsrc ! fakesink").unwrap();
        let started = Instant::now();
        pipeline.play().unwrap();
        let event = pipeline.poll(Duration::from_secs(5)).unwrap();
        assert_eq!(event, Some(PipelineEvent::Eos));
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[test]
    fn poll_returns_none_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-launch.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        make_executable(&script);

        let engine = LaunchEngine::new(&script);
        let mut pipeline = engine.prepare("videotestsrc ! fakesink").unwrap();
        pipeline.play().unwrap();
        let started = Instant::now();
        assert_eq!(pipeline.poll(Duration::from_millis(50)).unwrap(), None);
        assert!(started.elapsed() >= Duration::from_millis(50));
        pipeline.teardown();
    }

    #[cfg(unix)]
    fn wait_event(pipeline: &mut dyn Pipeline) -> PipelineEvent {
        loop {
            if let Some(event) = pipeline.poll(Duration::from_millis(10)).unwrap() {
                return event;
            }
        }
    }

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }
}
