//! ---
//! eb_section: "03-logging"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Structured logging adapters and sinks."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! Macros that attach [`LogContext`](crate::LogContext) fields to `tracing` events.

/// Emit an informational log enriched with job context.
#[macro_export]
macro_rules! bench_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::bench_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::bench_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with job context.
#[macro_export]
macro_rules! bench_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::bench_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::bench_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with job context.
#[macro_export]
macro_rules! bench_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::bench_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::bench_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! bench_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            job = ctx.job.unwrap_or_default(),
            batch = ctx.batch.unwrap_or_default(),
            variant = ctx.variant.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}
