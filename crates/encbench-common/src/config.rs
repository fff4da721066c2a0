//! ---
//! eb_section: "01-core-functionality"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Shared primitives and utilities for the benchmark runtime."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_candidates() -> Vec<u32> {
    vec![1, 2, 4, 8, 12, 16, 20, 24, 28, 32]
}

fn default_work_duration() -> Duration {
    Duration::from_secs(20)
}

fn default_cool_down() -> Duration {
    Duration::from_secs(2)
}

fn default_launch_stagger() -> Duration {
    Duration::from_millis(50)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_overhead_factor() -> f64 {
    1.1
}

fn default_launcher() -> PathBuf {
    PathBuf::from("gst-launch-1.0")
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_framerate() -> u32 {
    24
}

fn default_pixel_format() -> String {
    "I420".to_owned()
}

fn default_pattern() -> String {
    "white".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_preset() -> u32 {
    1
}

fn default_gop_size() -> u32 {
    60
}

fn default_profile() -> String {
    "baseline".to_owned()
}

fn default_sink() -> String {
    "fakesink".to_owned()
}

fn default_bitrate_kbps() -> u32 {
    5000
}

fn default_const_quality() -> f64 {
    23.0
}

fn default_encoder_binary() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_probe_duration() -> Duration {
    Duration::from_secs(60)
}

fn default_probe_source() -> String {
    "testsrc2=size=1920x1080:rate=24,format=yuv420p".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for the benchmark harness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no candidate existed and built-in defaults were used.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "ENCBENCH_CONFIG";

    /// Load configuration from disk, respecting the `ENCBENCH_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// An explicit `ENCBENCH_CONFIG` path must exist. Candidate paths are
    /// optional; when none of them exist the defaults are returned.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!(
            inspected = %candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            "no configuration file found; using defaults"
        );
        Ok(LoadedAppConfig {
            config: Self::default(),
            source: None,
        })
    }

    /// Load and validate one configuration file, ignoring `ENCBENCH_CONFIG`.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.sweep.validate()?;
        self.policy.validate()?;
        self.pipeline.validate()?;
        self.encoder.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_candidates")]
    pub candidates: Vec<u32>,
    /// Seconds of video each job encodes.
    #[serde(default = "default_work_duration", rename = "duration_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub work_duration: Duration,
    #[serde(default = "default_cool_down", rename = "cool_down_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub cool_down: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            work_duration: default_work_duration(),
            cool_down: default_cool_down(),
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        validate_candidates(&self.candidates)?;
        if self.work_duration < Duration::from_secs(1) {
            return Err(anyhow!("sweep duration_secs must be at least 1"));
        }
        Ok(())
    }
}

/// Check that batch sizes are non-empty, positive, and strictly ascending.
pub fn validate_candidates(candidates: &[u32]) -> Result<()> {
    if candidates.is_empty() {
        return Err(anyhow!("sweep must declare at least one candidate"));
    }
    if candidates.contains(&0) {
        return Err(anyhow!("sweep candidates must be at least 1"));
    }
    if let Some(pair) = candidates.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(anyhow!(
            "sweep candidates must be strictly ascending ({} is followed by {})",
            pair[0],
            pair[1]
        ));
    }
    Ok(())
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_launch_stagger", rename = "launch_stagger_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub launch_stagger: Duration,
    #[serde(default = "default_poll_interval", rename = "poll_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            launch_stagger: default_launch_stagger(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Pass/fail criterion applied to each successful job in a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PolicyConfig {
    /// Each job must finish within `work_duration * overhead_factor`.
    OnTime {
        #[serde(default = "default_overhead_factor")]
        overhead_factor: f64,
    },
    /// Each job must sustain at least `threshold` times realtime.
    MinRate { threshold: f64 },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::OnTime {
            overhead_factor: default_overhead_factor(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        match *self {
            PolicyConfig::OnTime { overhead_factor } if !(overhead_factor >= 1.0) => Err(anyhow!(
                "on-time overhead_factor must be >= 1.0 (got {})",
                overhead_factor
            )),
            PolicyConfig::MinRate { threshold } if !(threshold > 0.0) => Err(anyhow!(
                "min-rate threshold must be > 0 (got {})",
                threshold
            )),
            _ => Ok(()),
        }
    }
}

/// Pipeline backend used to run each encode job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Spawn `gst-launch-1.0` per job.
    #[default]
    Launch,
    /// In-process GStreamer bindings; requires the `native` feature.
    Native,
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "launch" => Ok(EngineKind::Launch),
            "native" => Ok(EngineKind::Native),
            other => Err(format!("unknown engine: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    H264,
    H265,
}

impl Codec {
    /// NVENC element shipped by the GStreamer `nvcodec` plugin.
    pub fn nvenc_element(&self) -> &'static str {
        match self {
            Codec::H264 => "nvh264enc",
            Codec::H265 => "nvh265enc",
        }
    }

    pub fn caps_name(&self) -> &'static str {
        match self {
            Codec::H264 => "video/x-h264",
            Codec::H265 => "video/x-h265",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RateControlConfig {
    Cbr {
        #[serde(default = "default_bitrate_kbps")]
        bitrate_kbps: u32,
    },
    Vbr {
        #[serde(default = "default_const_quality")]
        const_quality: f64,
        #[serde(default)]
        bitrate_kbps: Option<u32>,
    },
}

impl Default for RateControlConfig {
    fn default() -> Self {
        RateControlConfig::Cbr {
            bitrate_kbps: default_bitrate_kbps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default = "default_launcher")]
    pub launcher: PathBuf,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Live sources pace buffers at the frame rate instead of pushing as fast as possible.
    #[serde(default = "default_true")]
    pub is_live: bool,
    #[serde(default)]
    pub codec: Codec,
    /// Overrides the element derived from `codec`.
    #[serde(default)]
    pub encoder_element: Option<String>,
    #[serde(default)]
    pub rate_control: RateControlConfig,
    #[serde(default = "default_preset")]
    pub preset: u32,
    #[serde(default = "default_true")]
    pub zerolatency: bool,
    #[serde(default = "default_gop_size")]
    pub gop_size: u32,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_sink")]
    pub sink: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            launcher: default_launcher(),
            width: default_width(),
            height: default_height(),
            framerate: default_framerate(),
            pixel_format: default_pixel_format(),
            pattern: default_pattern(),
            is_live: true,
            codec: Codec::default(),
            encoder_element: None,
            rate_control: RateControlConfig::default(),
            preset: default_preset(),
            zerolatency: true,
            gop_size: default_gop_size(),
            profile: default_profile(),
            sink: default_sink(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "pipeline resolution must be non-zero (got {}x{})",
                self.width,
                self.height
            ));
        }
        if self.framerate == 0 {
            return Err(anyhow!("pipeline framerate must be at least 1"));
        }
        if let RateControlConfig::Vbr { const_quality, .. } = self.rate_control {
            if !(0.0..=51.0).contains(&const_quality) {
                return Err(anyhow!(
                    "vbr const_quality must be within 0..=51 (got {})",
                    const_quality
                ));
            }
        }
        Ok(())
    }
}

/// One named invocation of the command-line encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub title: Option<String>,
    /// Codec arguments placed between the input and the null muxer.
    pub codec_args: Vec<String>,
    /// Speed multiple the probe must strictly exceed.
    pub min_speed: f64,
}

fn default_probes() -> IndexMap<String, ProbeConfig> {
    let mut probes = IndexMap::new();
    probes.insert(
        "cpu".to_owned(),
        ProbeConfig {
            title: Some("CPU x264 Encoding Test (Production Settings)".to_owned()),
            codec_args: [
                "-c:v", "libx264", "-refs", "1", "-tune", "zerolatency", "-coder", "0",
                "-subq", "4", "-rc-lookahead", "20", "-mbtree", "1", "-crf", "23",
                "-profile:v", "baseline", "-pix_fmt", "yuv420p",
            ]
            .iter()
            .map(|arg| (*arg).to_owned())
            .collect(),
            min_speed: 1.0,
        },
    );
    probes.insert(
        "gpu".to_owned(),
        ProbeConfig {
            title: Some("GPU NVENC Encoding Test (Production Equivalent)".to_owned()),
            codec_args: [
                "-c:v", "h264_nvenc", "-preset", "p1", "-tune", "ll", "-profile:v",
                "baseline", "-rc", "vbr", "-cq", "23", "-refs", "1", "-bf", "0",
            ]
            .iter()
            .map(|arg| (*arg).to_owned())
            .collect(),
            min_speed: 5.0,
        },
    );
    probes
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(default = "default_encoder_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_probe_source")]
    pub source: String,
    #[serde(default = "default_probe_duration", rename = "duration_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    #[serde(default = "default_probes")]
    pub probes: IndexMap<String, ProbeConfig>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: default_encoder_binary(),
            source: default_probe_source(),
            duration: default_probe_duration(),
            probes: default_probes(),
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, probe) in &self.probes {
            if probe.codec_args.is_empty() {
                return Err(anyhow!("encoder probe '{}' declares no codec_args", name));
            }
            if !(probe.min_speed >= 0.0) {
                return Err(anyhow!(
                    "encoder probe '{}' min_speed must be non-negative",
                    name
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
