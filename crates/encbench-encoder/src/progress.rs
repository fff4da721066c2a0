//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Command-line encoder probes."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use encbench_common::time::{clock_to_seconds, frames_per_second};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static FRAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"frame=\s*(\d+)").expect("valid regex"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(\d{2}):(\d{2}):(\d{2}\.\d+)").expect("valid regex"));
static SPEED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"speed=\s*(\d+\.?\d*)x").expect("valid regex"));

/// Final progress values reported by an ffmpeg run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub frames: u64,
    pub media_seconds: f64,
    pub speed: f64,
}

impl ProgressSummary {
    /// Parse ffmpeg stderr, keeping the last occurrence of each field.
    ///
    /// Progress lines are rewritten with `\r`, so the final values are the
    /// last matches anywhere in the output. Missing fields stay at zero.
    pub fn parse(output: &str) -> Self {
        let frames = FRAME_RE
            .captures_iter(output)
            .last()
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0);
        let media_seconds = TIME_RE
            .captures_iter(output)
            .last()
            .and_then(|caps| {
                let hours = caps[1].parse().ok()?;
                let minutes = caps[2].parse().ok()?;
                let seconds = caps[3].parse().ok()?;
                Some(clock_to_seconds(hours, minutes, seconds))
            })
            .unwrap_or(0.0);
        let speed = SPEED_RE
            .captures_iter(output)
            .last()
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0.0);
        Self {
            frames,
            media_seconds,
            speed,
        }
    }

    pub fn fps(&self) -> f64 {
        frames_per_second(self.frames, self.media_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Input #0, lavfi, from 'testsrc2=size=1920x1080:rate=24,format=yuv420p':\n\
        frame=  312 fps=103 q=-0.0 size=N/A time=00:00:13.00 bitrate=N/A speed=4.31x    \r\
        frame=  720 fps=104 q=-0.0 size=N/A time=00:00:30.00 bitrate=N/A speed=4.33x    \r\
        frame= 1440 fps=104 q=-0.0 Lsize=N/A time=00:01:00.00 bitrate=N/A speed=4.35x    \n\
        bench: utime=52.103s stime=0.912s rtime=13.801s\n";

    #[test]
    fn keeps_last_values() {
        let progress = ProgressSummary::parse(SAMPLE);
        assert_eq!(progress.frames, 1440);
        assert!((progress.media_seconds - 60.0).abs() < 1e-9);
        assert!((progress.speed - 4.35).abs() < 1e-9);
        assert!((progress.fps() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn missing_fields_are_zero() {
        let progress = ProgressSummary::parse("Unknown encoder 'h264_nvenc'\n");
        assert_eq!(progress, ProgressSummary::default());
        assert_eq!(progress.fps(), 0.0);
    }

    #[test]
    fn integer_speed_is_accepted() {
        let progress = ProgressSummary::parse("frame=48 time=00:00:02.00 speed=12x");
        assert!((progress.speed - 12.0).abs() < 1e-9);
    }
}
