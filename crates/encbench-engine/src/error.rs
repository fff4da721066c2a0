//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Media pipeline engine abstraction and backends."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to construct pipeline: {0}")]
    Construct(String),
    #[error("failed to start pipeline: {0}")]
    Start(String),
    #[error("pipeline launcher {launcher} unavailable: {source}")]
    LauncherUnavailable {
        launcher: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine backend '{0}' is not compiled in; rebuild with `--features native`")]
    BackendUnavailable(&'static str),
    #[error("engine runtime initialisation failed: {0}")]
    Init(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Errors raised before the pipeline produced any media.
    pub fn is_start_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Construct(_)
                | EngineError::Start(_)
                | EngineError::LauncherUnavailable { .. }
                | EngineError::BackendUnavailable(_)
        )
    }
}
