//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Media pipeline engine abstraction and backends."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::fmt::Write as _;
use std::time::Duration;

use encbench_common::config::{PipelineConfig, RateControlConfig};

/// Builds the NVENC test pipeline description for a given amount of media.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    config: PipelineConfig,
}

impl PipelineSpec {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn encoder_element(&self) -> &str {
        self.config
            .encoder_element
            .as_deref()
            .unwrap_or_else(|| self.config.codec.nvenc_element())
    }

    /// Buffers the test source emits to cover `work` seconds of video.
    pub fn num_buffers(&self, work: Duration) -> u64 {
        (work.as_secs_f64() * f64::from(self.config.framerate)).round() as u64
    }

    /// Render the textual launch description for `work` seconds of video.
    pub fn describe(&self, work: Duration) -> String {
        let cfg = &self.config;
        let mut out = String::with_capacity(256);
        let _ = write!(
            out,
            "videotestsrc num-buffers={} pattern={} is-live={}",
            self.num_buffers(work),
            cfg.pattern,
            cfg.is_live
        );
        let _ = write!(
            out,
            " ! video/x-raw,format={},width={},height={},framerate={}/1",
            cfg.pixel_format, cfg.width, cfg.height, cfg.framerate
        );
        let _ = write!(out, " ! {}", self.encoder_element());
        match cfg.rate_control {
            RateControlConfig::Cbr { bitrate_kbps } => {
                let _ = write!(out, " rc-mode=cbr bitrate={}", bitrate_kbps);
            }
            RateControlConfig::Vbr {
                const_quality,
                bitrate_kbps,
            } => {
                let _ = write!(out, " rc-mode=vbr const-quality={}", const_quality);
                if let Some(bitrate) = bitrate_kbps {
                    let _ = write!(out, " bitrate={}", bitrate);
                }
            }
        }
        let _ = write!(
            out,
            " preset={} zerolatency={} gop-size={}",
            cfg.preset, cfg.zerolatency, cfg.gop_size
        );
        let _ = write!(
            out,
            " ! {},profile={} ! {}",
            cfg.codec.caps_name(),
            cfg.profile,
            cfg.sink
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encbench_common::config::Codec;

    #[test]
    fn default_description_matches_production_pipeline() {
        let spec = PipelineSpec::new(PipelineConfig::default());
        assert_eq!(
            spec.describe(Duration::from_secs(20)),
            "videotestsrc num-buffers=480 pattern=white is-live=true \
             ! video/x-raw,format=I420,width=1920,height=1080,framerate=24/1 \
             ! nvh264enc rc-mode=cbr bitrate=5000 preset=1 zerolatency=true gop-size=60 \
             ! video/x-h264,profile=baseline ! fakesink"
        );
    }

    #[test]
    fn vbr_hevc_description() {
        let spec = PipelineSpec::new(PipelineConfig {
            codec: Codec::H265,
            is_live: false,
            profile: "main".into(),
            rate_control: RateControlConfig::Vbr {
                const_quality: 23.0,
                bitrate_kbps: Some(8000),
            },
            ..PipelineConfig::default()
        });
        let description = spec.describe(Duration::from_secs(10));
        assert!(description.starts_with("videotestsrc num-buffers=240 pattern=white is-live=false"));
        assert!(description.contains("! nvh265enc rc-mode=vbr const-quality=23 bitrate=8000 "));
        assert!(description.ends_with("! video/x-h265,profile=main ! fakesink"));
    }

    #[test]
    fn encoder_override_wins() {
        let spec = PipelineSpec::new(PipelineConfig {
            encoder_element: Some("nvautogpuh264enc".into()),
            ..PipelineConfig::default()
        });
        assert_eq!(spec.encoder_element(), "nvautogpuh264enc");
    }
}
