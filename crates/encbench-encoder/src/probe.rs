//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Command-line encoder probes."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::fmt::Write as _;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use encbench_common::config::{EncoderConfig, ProbeConfig};
use tracing::{info, warn};

use crate::error::EncoderError;
use crate::progress::ProgressSummary;

const STDERR_HEAD_CHARS: usize = 200;

/// A single named encoder invocation.
#[derive(Debug, Clone)]
pub struct EncoderProbe<'a> {
    name: &'a str,
    probe: &'a ProbeConfig,
    encoder: &'a EncoderConfig,
}

impl<'a> EncoderProbe<'a> {
    pub fn new(name: &'a str, probe: &'a ProbeConfig, encoder: &'a EncoderConfig) -> Self {
        Self {
            name,
            probe,
            encoder,
        }
    }

    /// Every probe declared in configuration, in declaration order.
    pub fn all(encoder: &'a EncoderConfig) -> Vec<Self> {
        encoder
            .probes
            .iter()
            .map(|(name, probe)| Self::new(name, probe, encoder))
            .collect()
    }

    pub fn find(encoder: &'a EncoderConfig, name: &str) -> Result<Self, EncoderError> {
        encoder
            .probes
            .get_key_value(name)
            .map(|(name, probe)| Self::new(name, probe, encoder))
            .ok_or_else(|| EncoderError::UnknownProbe(name.to_owned()))
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn title(&self) -> &str {
        self.probe.title.as_deref().unwrap_or(self.name)
    }

    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-benchmark", "-f", "lavfi", "-i"]
            .iter()
            .map(|arg| (*arg).to_owned())
            .collect();
        args.push(self.encoder.source.clone());
        args.push("-t".to_owned());
        args.push(self.encoder.duration.as_secs().to_string());
        args.extend(self.probe.codec_args.iter().cloned());
        args.extend(["-f", "null", "-"].iter().map(|arg| (*arg).to_owned()));
        args
    }

    /// Run the encoder to completion and evaluate its output.
    pub fn run(&self) -> ProbeReport {
        let binary = self.encoder.binary.display().to_string();
        info!(probe = self.name, %binary, "starting encoder probe");
        let started = Instant::now();
        let output = Command::new(&self.encoder.binary)
            .args(self.args())
            .stdin(Stdio::null())
            .output();
        let elapsed = started.elapsed();

        match output {
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let failure = (!output.status.success()).then(|| EncoderError::NonZeroExit {
                    status: output.status.to_string(),
                    stderr_head: head(&stderr, STDERR_HEAD_CHARS),
                });
                self.evaluate(elapsed, &stderr, failure)
            }
            Err(source) => {
                warn!(probe = self.name, %binary, error = %source, "encoder could not be spawned");
                self.evaluate(elapsed, "", Some(EncoderError::Spawn { binary, source }))
            }
        }
    }

    /// Build the report from captured output; `failure` marks an outright failed run.
    pub fn evaluate(
        &self,
        elapsed: Duration,
        stderr: &str,
        failure: Option<EncoderError>,
    ) -> ProbeReport {
        let progress = ProgressSummary::parse(stderr);
        let passed = failure.is_none() && progress.speed > self.probe.min_speed;
        info!(
            probe = self.name,
            frames = progress.frames,
            speed = progress.speed,
            elapsed = elapsed.as_secs_f64(),
            passed,
            "encoder probe finished"
        );
        ProbeReport {
            name: self.name.to_owned(),
            title: self.title().to_owned(),
            elapsed,
            progress,
            min_speed: self.probe.min_speed,
            passed,
            failure,
        }
    }
}

#[derive(Debug)]
pub struct ProbeReport {
    pub name: String,
    pub title: String,
    pub elapsed: Duration,
    pub progress: ProgressSummary,
    pub min_speed: f64,
    pub passed: bool,
    pub failure: Option<EncoderError>,
}

impl ProbeReport {
    pub fn status_label(&self) -> String {
        if self.passed {
            "✓ PASS".to_owned()
        } else {
            format!("✗ FAIL (expected >{}x)", self.min_speed)
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(failure) = &self.failure {
            let _ = writeln!(out, "\n✗ {} failed", self.name);
            let _ = writeln!(out, "Error: {}", failure);
            return out;
        }
        let _ = writeln!(out, "\nResults:");
        let _ = writeln!(out, "  Elapsed: {:.2}s", self.elapsed.as_secs_f64());
        let _ = writeln!(out, "  Frames: {}", self.progress.frames);
        let _ = writeln!(out, "  Avg FPS: {:.1}", self.progress.fps());
        let _ = writeln!(out, "  Speed: {:.2}x", self.progress.speed);
        let _ = writeln!(out, "  Status: {}", self.status_label());
        out
    }
}

/// First `limit` characters of `text`, never splitting a code point.
pub fn head(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
