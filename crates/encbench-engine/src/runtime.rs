//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Media pipeline engine abstraction and backends."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! Process-wide engine lifecycle: initialise once, tear down when the guard drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use encbench_common::config::{EngineKind, PipelineConfig};
use once_cell::sync::OnceCell;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::launch::LaunchEngine;
use crate::pipeline::PipelineEngine;

static BACKEND_VERSION: OnceCell<String> = OnceCell::new();
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Guard owning the initialised media engine.
///
/// Only one guard may be alive at a time. Dropping it releases the backend.
#[derive(Debug)]
pub struct EngineRuntime {
    kind: EngineKind,
    engine: Arc<dyn PipelineEngine>,
}

impl EngineRuntime {
    pub fn init(config: &PipelineConfig) -> Result<Self> {
        if ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Init("engine runtime already active".into()));
        }
        match Self::build(config) {
            Ok(runtime) => Ok(runtime),
            Err(err) => {
                ACTIVE.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn build(config: &PipelineConfig) -> Result<Self> {
        let engine: Arc<dyn PipelineEngine> = match config.engine {
            EngineKind::Launch => {
                let engine = LaunchEngine::new(config.launcher.clone());
                let version = BACKEND_VERSION.get_or_try_init(|| engine.probe_version())?;
                info!(backend = "launch", launcher = %engine.launcher().display(), %version, "engine runtime initialised");
                Arc::new(engine)
            }
            EngineKind::Native => native_engine()?,
        };
        Ok(Self {
            kind: config.engine,
            engine,
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn engine(&self) -> Arc<dyn PipelineEngine> {
        Arc::clone(&self.engine)
    }

    pub fn backend_version(&self) -> Option<&'static str> {
        BACKEND_VERSION.get().map(String::as_str)
    }
}

impl Drop for EngineRuntime {
    fn drop(&mut self) {
        #[cfg(feature = "native")]
        if self.kind == EngineKind::Native && Arc::strong_count(&self.engine) == 1 {
            // SAFETY: the guard holds the last engine handle and every job
            // thread has been joined, so no GStreamer object remains.
            unsafe { crate::native::NativeEngine::deinit() };
        }
        ACTIVE.store(false, Ordering::SeqCst);
        info!(backend = self.engine.name(), "engine runtime released");
    }
}

#[cfg(feature = "native")]
fn native_engine() -> Result<Arc<dyn PipelineEngine>> {
    let version = BACKEND_VERSION.get_or_try_init(crate::native::NativeEngine::init)?;
    info!(backend = "native", %version, "engine runtime initialised");
    Ok(Arc::new(crate::native::NativeEngine))
}

#[cfg(not(feature = "native"))]
fn native_engine() -> Result<Arc<dyn PipelineEngine>> {
    Err(EngineError::BackendUnavailable("native"))
}
