//! Render-callback body.
//!
//! ```text
//! loop buffer ──► scratch L/R ──► LoopFilter ──► taps (scope, meters) ──► device buffer
//!   (wraps)        (≤ max_block_frames)   (in place)    (post-filter)          (interleaved)
//! ```
//!
//! [`LoopRenderer`] runs on the output device thread. Everything it needs is
//! allocated by [`RendererFactory::build`] before the stream starts, so a
//! render call performs no allocation, takes no lock and never logs.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::debug;

use crate::{
    audio::{resample::convert_to_rate, OutputFormat},
    engine::{
        diagnostics::RenderDiagnostics,
        tap::{BlockView, RenderTap},
    },
    error::{LoopScopeError, Result},
    filter::{BiquadCoeffs, FilterKind, FilterParameters, FilterSettings, LoopFilter},
    source::AudioBuffer,
};

/// Default upper bound on frames processed per internal block.
pub const DEFAULT_MAX_BLOCK_FRAMES: usize = 4096;

/// Builds a fresh [`LoopRenderer`] once the output format is known.
///
/// Cloned into the output session thread on every `start()`; each build
/// starts from loop position 0 with a cleared filter.
#[derive(Clone)]
pub struct RendererFactory {
    source: Arc<AudioBuffer>,
    params: Arc<FilterParameters>,
    taps: Vec<Arc<dyn RenderTap>>,
    running: Arc<AtomicBool>,
    diagnostics: Arc<RenderDiagnostics>,
    filter_kind: FilterKind,
    max_block_frames: usize,
}

impl RendererFactory {
    pub fn new(
        source: Arc<AudioBuffer>,
        params: Arc<FilterParameters>,
        running: Arc<AtomicBool>,
        diagnostics: Arc<RenderDiagnostics>,
    ) -> Self {
        Self {
            source,
            params,
            taps: Vec::new(),
            running,
            diagnostics,
            filter_kind: FilterKind::default(),
            max_block_frames: DEFAULT_MAX_BLOCK_FRAMES,
        }
    }

    pub fn with_tap(mut self, tap: Arc<dyn RenderTap>) -> Self {
        self.taps.push(tap);
        self
    }

    pub fn with_filter_kind(mut self, kind: FilterKind) -> Self {
        self.filter_kind = kind;
        self
    }

    pub fn with_max_block_frames(mut self, frames: usize) -> Self {
        self.max_block_frames = frames.max(1);
        self
    }

    pub fn source(&self) -> &AudioBuffer {
        &self.source
    }

    pub fn max_block_frames(&self) -> usize {
        self.max_block_frames
    }

    /// Prepare a renderer for `format`, resampling the loop when the device
    /// rate differs from the file rate.
    ///
    /// # Errors
    /// `EngineStartFailure` for a zero rate or channel count, or when the
    /// loop cannot be resampled.
    pub fn build(&self, format: OutputFormat) -> Result<LoopRenderer> {
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(LoopScopeError::EngineStartFailure(format!(
                "unusable output format: {} ch @ {} Hz",
                format.channels, format.sample_rate
            )));
        }

        let buffer = if self.source.sample_rate() == format.sample_rate {
            Arc::clone(&self.source)
        } else {
            debug!(
                from = self.source.sample_rate(),
                to = format.sample_rate,
                frames = self.source.frames(),
                "resampling loop to device rate"
            );
            Arc::new(convert_to_rate(&self.source, format.sample_rate)?)
        };

        Ok(LoopRenderer {
            scratch_left: vec![0.0; self.max_block_frames],
            scratch_right: vec![0.0; self.max_block_frames],
            buffer,
            position: 0,
            filter: LoopFilter::new(self.filter_kind, format.sample_rate),
            params: Arc::clone(&self.params),
            taps: self.taps.clone(),
            running: Arc::clone(&self.running),
            diagnostics: Arc::clone(&self.diagnostics),
            sample_rate: format.sample_rate,
            frames_rendered: 0,
        })
    }
}

/// Looping player + filter + taps, owned by the output callback.
pub struct LoopRenderer {
    buffer: Arc<AudioBuffer>,
    position: usize,
    filter: LoopFilter,
    params: Arc<FilterParameters>,
    taps: Vec<Arc<dyn RenderTap>>,
    running: Arc<AtomicBool>,
    diagnostics: Arc<RenderDiagnostics>,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
    sample_rate: u32,
    frames_rendered: u64,
}

impl LoopRenderer {
    /// Render into planar stereo buffers. Frames beyond the shorter of the
    /// two slices are left untouched.
    pub fn render_planar(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        self.diagnostics.callbacks.fetch_add(1, Ordering::Relaxed);
        if !self.running.load(Ordering::Acquire) {
            left[..frames].fill(0.0);
            right[..frames].fill(0.0);
            self.diagnostics
                .silent_callbacks
                .fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(self.scratch_left.len());
            self.render_block(n);
            left[done..done + n].copy_from_slice(&self.scratch_left[..n]);
            right[done..done + n].copy_from_slice(&self.scratch_right[..n]);
            done += n;
        }
    }

    /// Render into an interleaved device buffer with `channels` channels.
    ///
    /// Mono devices receive the L/R average; channels past the second are
    /// silent.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        self.diagnostics.callbacks.fetch_add(1, Ordering::Relaxed);
        if !self.running.load(Ordering::Acquire) {
            out.fill(0.0);
            self.diagnostics
                .silent_callbacks
                .fetch_add(1, Ordering::Relaxed);
            return;
        }

        let frames = out.len() / channels;
        let mut frame = 0;
        while frame < frames {
            let n = (frames - frame).min(self.scratch_left.len());
            self.render_block(n);
            let block = &mut out[frame * channels..(frame + n) * channels];
            for (i, slot) in block.chunks_exact_mut(channels).enumerate() {
                let l = self.scratch_left[i];
                let r = self.scratch_right[i];
                if channels == 1 {
                    slot[0] = 0.5 * (l + r);
                } else {
                    slot[0] = l;
                    slot[1] = r;
                    slot[2..].fill(0.0);
                }
            }
            frame += n;
        }
        out[frames * channels..].fill(0.0);
    }

    fn render_block(&mut self, frames: usize) {
        let settings = self.params.snapshot();
        if self.filter.prepare(&settings) {
            self.diagnostics
                .coefficient_updates
                .fetch_add(1, Ordering::Relaxed);
        }

        self.fill_from_loop(frames);
        self.filter.process(
            &mut self.scratch_left[..frames],
            &mut self.scratch_right[..frames],
        );

        let view = BlockView {
            left: &self.scratch_left[..frames],
            right: &self.scratch_right[..frames],
            sample_rate: self.sample_rate,
            frame_offset: self.frames_rendered,
        };
        for tap in &self.taps {
            tap.on_block(&view);
        }

        self.frames_rendered += frames as u64;
        self.diagnostics
            .blocks_rendered
            .fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .frames_rendered
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Copy the next `frames` looped frames into scratch, wrapping to the
    /// buffer start after its last frame.
    fn fill_from_loop(&mut self, frames: usize) {
        let src_left = self.buffer.left();
        let src_right = self.buffer.right();
        let len = src_left.len();

        let mut written = 0;
        while written < frames {
            let n = (len - self.position).min(frames - written);
            self.scratch_left[written..written + n]
                .copy_from_slice(&src_left[self.position..self.position + n]);
            self.scratch_right[written..written + n]
                .copy_from_slice(&src_right[self.position..self.position + n]);
            written += n;
            self.position += n;
            if self.position == len {
                self.position = 0;
                self.diagnostics.loop_wraps.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Read cursor within the loop, in frames.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Loop length at the output rate.
    pub fn loop_frames(&self) -> usize {
        self.buffer.frames()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn max_block_frames(&self) -> usize {
        self.scratch_left.len()
    }

    /// Filter settings latched for the most recent block, if engaged.
    pub fn applied_filter(&self) -> Option<FilterSettings> {
        if self.filter.is_bypassed() {
            None
        } else {
            self.filter.applied()
        }
    }

    pub fn filter_coefficients(&self) -> BiquadCoeffs {
        self.filter.coefficients()
    }
}
