//! Render taps: observers invoked once per rendered block.
//!
//! A tap sees the post-filter samples of every block before they reach the
//! output sink and must not alter them. Taps are registered by direct
//! reference (`Arc<dyn RenderTap>`) and run on the render thread, so an
//! implementation has the same obligations as the callback itself: no
//! allocation, no locks, no I/O.

use std::sync::atomic::{AtomicU64, Ordering};

use atomic_float::AtomicF32;

/// Borrowed view of one rendered stereo block.
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a> {
    pub left: &'a [f32],
    pub right: &'a [f32],
    /// Output sample rate of the block.
    pub sample_rate: u32,
    /// Frames rendered since `start()` before this block.
    pub frame_offset: u64,
}

impl BlockView<'_> {
    pub fn frames(&self) -> usize {
        self.left.len()
    }
}

/// Observer of rendered blocks.
pub trait RenderTap: Send + Sync + 'static {
    fn on_block(&self, block: &BlockView<'_>);
}

/// Peak and RMS of the most recent block, readable from any thread.
#[derive(Debug, Default)]
pub struct LevelTap {
    peak: AtomicF32,
    rms: AtomicF32,
    blocks: AtomicU64,
}

impl LevelTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute peak over both channels of the last block.
    pub fn peak(&self) -> f32 {
        self.peak.load(Ordering::Relaxed)
    }

    /// RMS over both channels of the last block.
    pub fn rms(&self) -> f32 {
        self.rms.load(Ordering::Relaxed)
    }

    pub fn blocks_seen(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }
}

impl RenderTap for LevelTap {
    fn on_block(&self, block: &BlockView<'_>) {
        let count = block.left.len() + block.right.len();
        if count == 0 {
            return;
        }
        let mut peak = 0.0f32;
        let mut sum_sq = 0.0f32;
        for &s in block.left.iter().chain(block.right) {
            peak = peak.max(s.abs());
            sum_sq += s * s;
        }
        self.peak.store(peak, Ordering::Relaxed);
        self.rms
            .store((sum_sq / count as f32).sqrt(), Ordering::Relaxed);
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn level_tap_measures_the_last_block() {
        let tap = LevelTap::new();
        let left = [0.5f32, -0.5, 0.5, -0.5];
        let right = [0.5f32, -0.5, 0.5, -0.5];
        tap.on_block(&BlockView {
            left: &left,
            right: &right,
            sample_rate: 48_000,
            frame_offset: 0,
        });
        assert_relative_eq!(tap.peak(), 0.5);
        assert_relative_eq!(tap.rms(), 0.5, epsilon = 1e-6);

        let quiet = [0.0f32; 4];
        tap.on_block(&BlockView {
            left: &quiet,
            right: &quiet,
            sample_rate: 48_000,
            frame_offset: 4,
        });
        assert_relative_eq!(tap.peak(), 0.0);
        assert_eq!(tap.blocks_seen(), 2);
    }

    #[test]
    fn empty_block_is_ignored() {
        let tap = LevelTap::new();
        tap.on_block(&BlockView {
            left: &[],
            right: &[],
            sample_rate: 44_100,
            frame_offset: 0,
        });
        assert_eq!(tap.blocks_seen(), 0);
    }
}
