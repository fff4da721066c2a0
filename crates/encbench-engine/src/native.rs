//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Media pipeline engine abstraction and backends."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
//! In-process GStreamer backend built on the `gstreamer` bindings.

use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;

use crate::error::{EngineError, Result};
use crate::pipeline::{ErrorStage, Pipeline, PipelineEngine, PipelineEvent};

/// Engine backed by `gst::parse::launch`; requires a live [`EngineRuntime`](crate::EngineRuntime).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl NativeEngine {
    pub(crate) fn init() -> Result<String> {
        gst::init().map_err(|err| EngineError::Init(err.to_string()))?;
        Ok(gst::version_string().to_string())
    }

    /// Release library-wide GStreamer state.
    ///
    /// # Safety
    /// No GStreamer object may be alive or used afterwards.
    pub(crate) unsafe fn deinit() {
        gst::deinit();
    }
}

impl PipelineEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn prepare(&self, description: &str) -> Result<Box<dyn Pipeline>> {
        let element =
            gst::parse::launch(description).map_err(|err| EngineError::Construct(err.to_string()))?;
        let bus = element
            .bus()
            .ok_or_else(|| EngineError::Construct("pipeline has no bus".into()))?;
        Ok(Box::new(NativePipeline {
            element,
            bus,
            active: false,
        }))
    }
}

#[derive(Debug)]
pub struct NativePipeline {
    element: gst::Element,
    bus: gst::Bus,
    active: bool,
}

impl Pipeline for NativePipeline {
    fn play(&mut self) -> Result<()> {
        self.active = true;
        self.element
            .set_state(gst::State::Playing)
            .map_err(|err| EngineError::Start(err.to_string()))?;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<PipelineEvent>> {
        let timeout = gst::ClockTime::from_nseconds(timeout.as_nanos() as u64);
        let Some(message) = self
            .bus
            .timed_pop_filtered(timeout, &[gst::MessageType::Error, gst::MessageType::Eos])
        else {
            return Ok(None);
        };
        let event = match message.view() {
            gst::MessageView::Eos(..) => PipelineEvent::Eos,
            gst::MessageView::Error(err) => PipelineEvent::Error {
                message: err.error().to_string(),
                debug: err.debug().map(|debug| debug.to_string()),
                stage: ErrorStage::Streaming,
            },
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    fn teardown(&mut self) {
        if std::mem::take(&mut self.active) {
            let _ = self.element.set_state(gst::State::Null);
        }
    }
}

impl Drop for NativePipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}
