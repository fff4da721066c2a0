//! ---
//! eb_section: "01-core-functionality"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Shared primitives and utilities for the benchmark runtime."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! Core shared primitives for the encbench workspace.
//! This crate exposes configuration loading, tracing setup, timing helpers,
//! and version metadata consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;
pub mod version;

pub use config::{
    AppConfig, BatchConfig, Codec, EncoderConfig, EngineKind, LoggingConfig, PipelineConfig,
    PolicyConfig, ProbeConfig, RateControlConfig, SweepConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use time::realtime_rate;
pub use version::VersionInfo;
