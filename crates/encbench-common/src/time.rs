//! ---
//! eb_section: "01-core-functionality"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Shared primitives and utilities for the benchmark runtime."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::time::Duration;

/// Realtime multiple achieved when `work` seconds of media took `elapsed` to process.
///
/// Returns `0.0` rather than infinity when nothing was measured.
pub fn realtime_rate(work: Duration, elapsed: Duration) -> f64 {
    let elapsed = elapsed.as_secs_f64();
    if elapsed > 0.0 {
        work.as_secs_f64() / elapsed
    } else {
        0.0
    }
}

/// Frames per second over a media duration, `0.0` when the duration is unknown.
pub fn frames_per_second(frames: u64, media_seconds: f64) -> f64 {
    if media_seconds > 0.0 {
        frames as f64 / media_seconds
    } else {
        0.0
    }
}

/// Convert `HH:MM:SS.ss` components into seconds.
pub fn clock_to_seconds(hours: u64, minutes: u64, seconds: f64) -> f64 {
    (hours * 3600 + minutes * 60) as f64 + seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_elapsed_rate_is_zero() {
        assert_eq!(realtime_rate(Duration::from_secs(20), Duration::ZERO), 0.0);
    }

    #[test]
    fn rate_is_work_over_elapsed() {
        let rate = realtime_rate(Duration::from_secs(20), Duration::from_secs(10));
        assert!((rate - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fps_guards_unknown_duration() {
        assert_eq!(frames_per_second(240, 0.0), 0.0);
        assert!((frames_per_second(240, 10.0) - 24.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clock_conversion() {
        assert!((clock_to_seconds(1, 2, 3.5) - 3723.5).abs() < 1e-9);
    }
}
