//! ---
//! eb_section: "03-logging"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Structured logging adapters and sinks."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Context-enriched logging helpers shared by the harness crates.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber writing to stderr.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Job identifier within the current batch.
    pub job: Option<u32>,
    /// Number of jobs in the batch the event belongs to.
    pub batch: Option<u32>,
    /// Benchmark variant (pipeline profile or probe name).
    pub variant: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a job identifier.
    pub fn with_job(mut self, job: u32) -> Self {
        self.job = Some(job);
        self
    }

    /// Attach the batch size.
    pub fn with_batch(mut self, batch: u32) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Attach a variant descriptor.
    pub fn with_variant(mut self, variant: &'a str) -> Self {
        self.variant = Some(variant);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized system event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    // `tracing::event!` needs a constant level, so branch per outcome.
    match outcome {
        SystemEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            job = ctx.job.unwrap_or_default(),
            batch = ctx.batch.unwrap_or_default(),
            variant = ctx.variant.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            job = ctx.job.unwrap_or_default(),
            batch = ctx.batch.unwrap_or_default(),
            variant = ctx.variant.unwrap_or(""),
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new().with_job(3).with_batch(8);
        bench_info!(context = ctx.clone(), "job started");
        bench_debug!("debug message");
        bench_error!(context = ctx, "exit code: {}", 1);
    }

    #[test]
    fn system_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_batch(4).with_variant("nvenc-cbr");
        log_system_event(
            Some(&ctx),
            "batch.completed",
            "all jobs finished",
            SystemEventOutcome::Success,
        );
        log_system_event(
            None,
            "batch.completed",
            "batch had failures",
            SystemEventOutcome::Fault,
        );
    }
}
