//! Caller-clocked output.
//!
//! `ManualBackend` claims a virtual device; the paired [`ManualClock`] pulls
//! blocks from the renderer on demand. Used for tests and for headless
//! rendering where no audio hardware is present. Clones share the same
//! virtual device, so a second engine opening a claimed backend fails the
//! way a busy hardware device would.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{OutputBackend, OutputFormat, OutputStream};
use crate::{
    engine::render::{LoopRenderer, RendererFactory},
    error::{LoopScopeError, Result},
    filter::{BiquadCoeffs, FilterSettings},
};

type Slot = Arc<Mutex<Option<LoopRenderer>>>;

/// Virtual output device driven by a [`ManualClock`].
#[derive(Clone)]
pub struct ManualBackend {
    format: OutputFormat,
    slot: Slot,
}

impl ManualBackend {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Clock handle for this virtual device.
    pub fn clock(&self) -> ManualClock {
        ManualClock {
            format: self.format,
            slot: Arc::clone(&self.slot),
        }
    }

    /// `true` while a stream holds the device.
    pub fn is_claimed(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl Default for ManualBackend {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

impl OutputBackend for ManualBackend {
    fn name(&self) -> &str {
        "manual"
    }

    fn open(&self, factory: RendererFactory) -> Result<Box<dyn OutputStream>> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(LoopScopeError::EngineStartFailure(
                "manual output already claimed".into(),
            ));
        }
        *slot = Some(factory.build(self.format)?);
        debug!(
            sample_rate = self.format.sample_rate,
            channels = self.format.channels,
            "manual output claimed"
        );
        Ok(Box::new(ManualStream {
            format: self.format,
            slot: Arc::clone(&self.slot),
        }))
    }
}

struct ManualStream {
    format: OutputFormat,
    slot: Slot,
}

impl OutputStream for ManualStream {
    fn format(&self) -> OutputFormat {
        self.format
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        self.slot.lock().take();
        debug!("manual output released");
    }
}

/// One pulled stereo block.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBlock {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl RenderedBlock {
    pub fn frames(&self) -> usize {
        self.left.len()
    }
}

/// Pulls blocks from whichever renderer currently holds the virtual device.
#[derive(Clone)]
pub struct ManualClock {
    format: OutputFormat,
    slot: Slot,
}

impl ManualClock {
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render `frames` frames as one callback. `None` when no stream is open.
    pub fn render(&self, frames: usize) -> Option<RenderedBlock> {
        let mut slot = self.slot.lock();
        let renderer = slot.as_mut()?;
        let mut block = RenderedBlock {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        };
        renderer.render_planar(&mut block.left, &mut block.right);
        Some(block)
    }

    /// Render `frames` frames interleaved for the virtual device's channel
    /// count.
    pub fn render_interleaved(&self, frames: usize) -> Option<Vec<f32>> {
        let mut slot = self.slot.lock();
        let renderer = slot.as_mut()?;
        let channels = self.format.channels as usize;
        let mut out = vec![0.0; frames * channels];
        renderer.render_interleaved(&mut out, channels);
        Some(out)
    }

    /// Render `blocks` consecutive callbacks of `frames` each.
    pub fn run(&self, blocks: usize, frames: usize) -> Vec<RenderedBlock> {
        (0..blocks).map_while(|_| self.render(frames)).collect()
    }

    pub fn is_running(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Read cursor of the active renderer.
    pub fn position(&self) -> Option<usize> {
        self.slot.lock().as_ref().map(LoopRenderer::position)
    }

    /// Filter settings latched by the active renderer's last block.
    pub fn applied_filter(&self) -> Option<FilterSettings> {
        self.slot.lock().as_ref().and_then(LoopRenderer::applied_filter)
    }

    pub fn filter_coefficients(&self) -> Option<BiquadCoeffs> {
        self.slot
            .lock()
            .as_ref()
            .map(LoopRenderer::filter_coefficients)
    }
}
