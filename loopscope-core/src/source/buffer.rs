//! Immutable planar sample buffer holding the loop.

use crate::error::{LoopScopeError, Result};

/// Planar f32 samples (one `Vec` per channel) at a known sample rate.
///
/// Built once on a non-RT thread and shared read-only with the renderer
/// through an `Arc`. Always mono or stereo and at least one frame long.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a buffer from per-channel sample vectors.
    ///
    /// # Errors
    /// `LoopScopeError::UnsupportedFormat` when there are not one or two
    /// channels, the channels differ in length, the buffer is empty or the
    /// sample rate is zero.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() || channels.len() > 2 {
            return Err(LoopScopeError::UnsupportedFormat(format!(
                "{} channels (expected mono or stereo)",
                channels.len()
            )));
        }
        if sample_rate == 0 {
            return Err(LoopScopeError::UnsupportedFormat(
                "sample rate of 0 Hz".into(),
            ));
        }
        let frames = channels[0].len();
        if frames == 0 {
            return Err(LoopScopeError::UnsupportedFormat("empty sample".into()));
        }
        if channels.iter().any(|c| c.len() != frames) {
            return Err(LoopScopeError::UnsupportedFormat(
                "channels have different lengths".into(),
            ));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::from_planar(vec![samples], sample_rate)
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::from_planar(vec![left, right], sample_rate)
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_stereo(&self) -> bool {
        self.channels.len() == 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples of channel `idx`, or `None` past the last channel.
    pub fn channel(&self, idx: usize) -> Option<&[f32]> {
        self.channels.get(idx).map(Vec::as_slice)
    }

    pub fn left(&self) -> &[f32] {
        &self.channels[0]
    }

    /// Right channel; a mono buffer reports its only channel here.
    pub fn right(&self) -> &[f32] {
        self.channels.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Loop length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_reports_the_same_channel_on_both_sides() {
        let buf = AudioBuffer::mono(vec![0.1, 0.2, 0.3], 48_000).unwrap();
        assert_eq!(buf.frames(), 3);
        assert!(!buf.is_stereo());
        assert_eq!(buf.left(), buf.right());
    }

    #[test]
    fn rejects_mismatched_channel_lengths() {
        let err = AudioBuffer::stereo(vec![0.0; 4], vec![0.0; 3], 44_100).unwrap_err();
        assert!(matches!(err, LoopScopeError::UnsupportedFormat(_)));
    }

    #[test]
    fn rejects_empty_and_wide_buffers() {
        assert!(AudioBuffer::mono(vec![], 44_100).is_err());
        assert!(AudioBuffer::from_planar(vec![vec![0.0]; 3], 44_100).is_err());
        assert!(AudioBuffer::mono(vec![0.0], 0).is_err());
    }

    #[test]
    fn duration_follows_sample_rate() {
        let buf = AudioBuffer::mono(vec![0.0; 22_050], 44_100).unwrap();
        assert!((buf.duration_secs() - 0.5).abs() < 1e-9);
    }
}
