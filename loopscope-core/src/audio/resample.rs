//! Whole-buffer sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! ## Design
//!
//! The loop is decoded at the file's rate but played at whatever rate the
//! output device negotiates. `RateConverter` converts the complete loop once
//! per `start()`, on the output session thread before the stream is built,
//! where allocation is allowed.
//!
//! When file rate == device rate, `RateConverter` is a passthrough and no
//! rubato session is created at all.
//!
//! ## Usage
//!
//! ```ignore
//! let mut rc = RateConverter::new(44_100, 48_000, 2, 1024)?;
//! let at_device_rate = rc.convert(&loop_buffer)?;
//! ```

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::error::{LoopScopeError, Result};
use crate::source::AudioBuffer;

/// Input frames handed to rubato per call.
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Converts planar f32 audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when both rates match (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    from_rate: u32,
    to_rate: u32,
    channels: usize,
    chunk_size: usize,
}

impl RateConverter {
    /// Create a new converter for `channels` planar channels.
    ///
    /// # Errors
    /// Returns `LoopScopeError::EngineStartFailure` if a rate is zero or rubato
    /// fails to initialise.
    pub fn new(from_rate: u32, to_rate: u32, channels: usize, chunk_size: usize) -> Result<Self> {
        if from_rate == 0 || to_rate == 0 {
            return Err(LoopScopeError::EngineStartFailure(format!(
                "invalid resampling rates {from_rate} -> {to_rate}"
            )));
        }
        let chunk_size = chunk_size.max(1);

        if from_rate == to_rate {
            return Ok(Self {
                resampler: None,
                from_rate,
                to_rate,
                channels,
                chunk_size,
            });
        }

        let ratio = to_rate as f64 / from_rate as f64;
        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0,
            PolynomialDegree::Cubic,
            chunk_size,
            channels,
        )
        .map_err(|e| LoopScopeError::EngineStartFailure(format!("resampler init: {e}")))?;

        debug!(from_rate, to_rate, channels, chunk_size, "loop resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            from_rate,
            to_rate,
            channels,
            chunk_size,
        })
    }

    /// Returns `true` when no resampling occurs.
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Output frame count for `frames` input frames.
    pub fn output_frames(&self, frames: usize) -> usize {
        if self.is_passthrough() {
            return frames;
        }
        let scaled = (frames as u64 * self.to_rate as u64 + self.from_rate as u64 / 2)
            / self.from_rate as u64;
        (scaled as usize).max(1)
    }

    /// Convert a complete buffer.
    ///
    /// The result is aligned with the input (rubato's output delay is
    /// trimmed) and holds exactly `output_frames(buffer.frames())` frames.
    ///
    /// # Errors
    /// `UnsupportedFormat` when the buffer does not match the converter's
    /// input rate or channel count; `EngineStartFailure` if rubato fails.
    pub fn convert(&mut self, buffer: &AudioBuffer) -> Result<AudioBuffer> {
        if buffer.sample_rate() != self.from_rate || buffer.channel_count() != self.channels {
            return Err(LoopScopeError::UnsupportedFormat(format!(
                "converter expects {} ch @ {} Hz, got {} ch @ {} Hz",
                self.channels,
                self.from_rate,
                buffer.channel_count(),
                buffer.sample_rate()
            )));
        }

        let expected = self.output_frames(buffer.frames());
        let chunk = self.chunk_size;
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(buffer.clone());
        };

        let inputs: Vec<&[f32]> = (0..self.channels)
            .filter_map(|idx| buffer.channel(idx))
            .collect();
        let frames = buffer.frames();
        let delay = resampler.output_delay();

        let mut scratch = vec![vec![0f32; resampler.output_frames_max()]; self.channels];
        let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); self.channels];

        let resample_err =
            |e: rubato::ResampleError| LoopScopeError::EngineStartFailure(format!("resample: {e}"));

        let mut pos = 0;
        while pos + chunk <= frames {
            let window: Vec<&[f32]> = inputs.iter().map(|ch| &ch[pos..pos + chunk]).collect();
            let (_, produced) = resampler
                .process_into_buffer(&window[..], &mut scratch[..], None)
                .map_err(resample_err)?;
            append(&mut out, &scratch, produced);
            pos += chunk;
        }

        if pos < frames {
            let window: Vec<&[f32]> = inputs.iter().map(|ch| &ch[pos..]).collect();
            let (_, produced) = resampler
                .process_partial_into_buffer(Some(&window[..]), &mut scratch[..], None)
                .map_err(resample_err)?;
            append(&mut out, &scratch, produced);
        }

        // Flush the filter tail until the delayed output covers the input.
        while out[0].len() < expected + delay {
            let (_, produced) = resampler
                .process_partial_into_buffer(None::<&[&[f32]]>, &mut scratch[..], None)
                .map_err(resample_err)?;
            if produced == 0 {
                break;
            }
            append(&mut out, &scratch, produced);
        }

        for channel in &mut out {
            channel.drain(..delay.min(channel.len()));
            channel.resize(expected, 0.0);
        }

        AudioBuffer::from_planar(out, self.to_rate)
    }
}

fn append(out: &mut [Vec<f32>], scratch: &[Vec<f32>], produced: usize) {
    for (dst, src) in out.iter_mut().zip(scratch) {
        dst.extend_from_slice(&src[..produced]);
    }
}

/// Convert `buffer` to `target_rate`, returning a clone when rates match.
pub fn convert_to_rate(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    RateConverter::new(
        buffer.sample_rate(),
        target_rate,
        buffer.channel_count(),
        DEFAULT_CHUNK_FRAMES,
    )?
    .convert(buffer)
}
