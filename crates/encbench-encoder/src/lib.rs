//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Command-line encoder probes."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! One-shot encoder runs: spawn ffmpeg against a synthetic source, read its
//! progress fields, and compare the achieved speed with a per-probe minimum.

pub mod error;
pub mod probe;
pub mod progress;

pub use error::EncoderError;
pub use probe::{EncoderProbe, ProbeReport};
pub use progress::ProgressSummary;
