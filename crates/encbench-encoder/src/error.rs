//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Command-line encoder probes."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("failed to spawn encoder {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoder exited with {status}: {stderr_head}")]
    NonZeroExit { status: String, stderr_head: String },
    #[error("unknown probe '{0}'")]
    UnknownProbe(String),
}
