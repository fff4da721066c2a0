//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Media pipeline engine abstraction and backends."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! Pipeline engine seam used by the harness.
//!
//! The harness only needs to start a pipeline, poll it for end-of-stream or
//! error with a timeout, and tear it down. [`PipelineEngine`] captures that
//! contract; [`LaunchEngine`] fulfils it with `gst-launch-1.0` subprocesses
//! and, with the `native` feature, [`NativeEngine`] uses in-process bindings.

pub mod description;
pub mod error;
pub mod launch;
#[cfg(feature = "native")]
pub mod native;
pub mod pipeline;
pub mod runtime;

pub use description::PipelineSpec;
pub use error::{EngineError, Result};
pub use launch::LaunchEngine;
#[cfg(feature = "native")]
pub use native::NativeEngine;
pub use pipeline::{ErrorStage, Pipeline, PipelineEngine, PipelineEvent};
pub use runtime::EngineRuntime;
