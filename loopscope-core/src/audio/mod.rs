//! Output sinks.
//!
//! # Design constraints
//!
//! The output callback runs on an OS audio thread at elevated priority. It
//! **must not**:
//! - Allocate heap memory
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! Backends satisfy that contract by handing the device callback a fully
//! prepared [`LoopRenderer`](crate::engine::render::LoopRenderer) built from
//! the [`RendererFactory`] once the device format is known.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). [`OutputBackend::open`] is therefore called on the engine's output
//! session thread, and the returned [`OutputStream`] is dropped on that same
//! thread when the engine stops.

pub mod cpal_output;
pub mod device;
pub mod manual;
pub mod resample;

pub use cpal_output::CpalBackend;
pub use manual::{ManualBackend, ManualClock, RenderedBlock};

use serde::{Deserialize, Serialize};

use crate::{engine::render::RendererFactory, error::Result};

/// Format negotiated with the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// Something that can claim an output and drive a renderer from its clock.
pub trait OutputBackend: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Claim the output, build a renderer for its format and start the
    /// clock.
    ///
    /// # Errors
    /// `EngineStartFailure` when the device is unavailable or the stream
    /// cannot be built.
    fn open(&self, factory: RendererFactory) -> Result<Box<dyn OutputStream>>;
}

/// A running output. Dropping it stops the clock and releases the device.
pub trait OutputStream {
    fn format(&self) -> OutputFormat;
}
