//! Per-channel scope ring written by the render callback.
//!
//! Each channel is a boxed slice of `AtomicF32` slots plus a monotonically
//! increasing `u64` write cursor. The writer stores samples with relaxed
//! ordering and then publishes the new cursor with `Release`; readers load the
//! cursor with `Acquire` and copy the window behind it. Nobody ever waits:
//! a reader racing a write may see a window that is partly one block newer,
//! which shows up as one frame of visual jitter and nothing worse.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use serde::{Deserialize, Serialize};

use crate::engine::tap::{BlockView, RenderTap};
use crate::error::{LoopScopeError, Result};

/// Slots per channel unless configured otherwise.
pub const DEFAULT_SCOPE_CAPACITY: usize = 4096;

/// Scope channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeChannel {
    Left,
    Right,
}

impl ScopeChannel {
    pub const ALL: [ScopeChannel; 2] = [ScopeChannel::Left, ScopeChannel::Right];

    #[inline]
    fn index(self) -> usize {
        match self {
            ScopeChannel::Left => 0,
            ScopeChannel::Right => 1,
        }
    }
}

#[derive(Debug)]
struct ChannelRing {
    slots: Box<[AtomicF32]>,
    cursor: AtomicU64,
}

impl ChannelRing {
    fn with_capacity(capacity: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| LoopScopeError::AllocationFailure { frames: capacity })?;
        slots.extend((0..capacity).map(|_| AtomicF32::new(0.0)));
        Ok(Self {
            slots: slots.into_boxed_slice(),
            cursor: AtomicU64::new(0),
        })
    }
}

/// Fixed-capacity stereo scope buffer: one writer, any number of readers.
#[derive(Debug)]
pub struct ScopeRingBuffer {
    channels: [ChannelRing; 2],
    capacity: usize,
    enabled: AtomicBool,
}

impl ScopeRingBuffer {
    /// Allocate a zeroed ring of `capacity` slots per channel.
    ///
    /// # Errors
    /// `LoopScopeError::AllocationFailure` for a zero capacity or when the
    /// slots cannot be reserved.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(LoopScopeError::AllocationFailure { frames: 0 });
        }
        Ok(Self {
            channels: [
                ChannelRing::with_capacity(capacity)?,
                ChannelRing::with_capacity(capacity)?,
            ],
            capacity,
            enabled: AtomicBool::new(true),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `samples` to `channel`. Render thread only.
    ///
    /// Never blocks, never allocates. When `samples` is longer than the ring
    /// only its tail is stored, but the cursor still advances by the full
    /// length so readers keep seeing the newest data last.
    #[inline]
    pub fn write(&self, channel: ScopeChannel, samples: &[f32]) {
        if !self.enabled.load(Ordering::Relaxed) || samples.is_empty() {
            return;
        }
        let ring = &self.channels[channel.index()];
        let cap = self.capacity;
        let start = ring.cursor.load(Ordering::Relaxed);
        let skip = samples.len().saturating_sub(cap);

        let mut pos = ((start + skip as u64) % cap as u64) as usize;
        for &sample in &samples[skip..] {
            ring.slots[pos].store(sample, Ordering::Relaxed);
            pos += 1;
            if pos == cap {
                pos = 0;
            }
        }
        ring.cursor
            .store(start + samples.len() as u64, Ordering::Release);
    }

    /// Copy the `out.len()` most recent samples (oldest first) into `out`.
    ///
    /// At most `capacity` samples are copied; the count is returned. Positions
    /// that were never written read as silence.
    pub fn snapshot_into(&self, channel: ScopeChannel, out: &mut [f32]) -> usize {
        let ring = &self.channels[channel.index()];
        let cap = self.capacity;
        let n = out.len().min(cap);
        let end = ring.cursor.load(Ordering::Acquire);

        let mut pos = ((end % cap as u64) as usize + cap - n) % cap;
        for slot in out[..n].iter_mut() {
            *slot = ring.slots[pos].load(Ordering::Relaxed);
            pos += 1;
            if pos == cap {
                pos = 0;
            }
        }
        n
    }

    /// The `n` most recent samples of `channel` in chronological order.
    ///
    /// `n > capacity` yields exactly `capacity` samples.
    pub fn snapshot(&self, channel: ScopeChannel, n: usize) -> Vec<f32> {
        let mut out = vec![0.0; n.min(self.capacity)];
        self.snapshot_into(channel, &mut out);
        out
    }

    /// Total samples ever written to `channel` since the last clear.
    pub fn written(&self, channel: ScopeChannel) -> u64 {
        self.channels[channel.index()].cursor.load(Ordering::Acquire)
    }

    /// Zero every slot and rewind both cursors.
    ///
    /// Only call while the render thread is quiescent (engine stopped).
    pub fn clear(&self) {
        for ring in &self.channels {
            for slot in ring.slots.iter() {
                slot.store(0.0, Ordering::Relaxed);
            }
            ring.cursor.store(0, Ordering::Release);
        }
    }

    /// Turn capture on or off. Disabling also clears the ring.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::AcqRel);
        if was && !enabled {
            self.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl RenderTap for ScopeRingBuffer {
    #[inline]
    fn on_block(&self, block: &BlockView<'_>) {
        self.write(ScopeChannel::Left, block.left);
        self.write(ScopeChannel::Right, block.right);
    }
}

/// Read handle for a display-refresh-driven consumer.
///
/// Cheap to clone and safe to call from any thread at any time, including
/// before playback starts and after the engine is gone (zeros either way).
#[derive(Debug, Clone)]
pub struct ScopeReader {
    ring: Arc<ScopeRingBuffer>,
}

impl ScopeReader {
    pub fn new(ring: Arc<ScopeRingBuffer>) -> Self {
        Self { ring }
    }

    /// The `n` most recent samples of `channel`, oldest first.
    pub fn read(&self, channel: ScopeChannel, n: usize) -> Vec<f32> {
        self.ring.snapshot(channel, n)
    }

    /// Allocation-free variant of [`read`](Self::read) for a reused buffer.
    pub fn read_into(&self, channel: ScopeChannel, out: &mut [f32]) -> usize {
        self.ring.snapshot_into(channel, out)
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn written(&self, channel: ScopeChannel) -> u64 {
        self.ring.written(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(range: std::ops::Range<usize>) -> Vec<f32> {
        range.map(|i| i as f32).collect()
    }

    #[test]
    fn snapshot_returns_last_n_in_write_order() {
        let ring = ScopeRingBuffer::new(16).unwrap();
        // Odd block sizes force several wraparounds.
        let mut next = 0;
        for len in [5, 7, 3, 11, 9] {
            ring.write(ScopeChannel::Left, &ramp(next..next + len));
            next += len;
        }
        for n in [1, 4, 15, 16] {
            assert_eq!(
                ring.snapshot(ScopeChannel::Left, n),
                ramp(next - n..next),
                "n={n}"
            );
        }
    }

    #[test]
    fn oversized_request_is_truncated_to_capacity() {
        let ring = ScopeRingBuffer::new(8).unwrap();
        ring.write(ScopeChannel::Right, &ramp(0..20));
        let snap = ring.snapshot(ScopeChannel::Right, 100);
        assert_eq!(snap, ramp(12..20));
    }

    #[test]
    fn unwritten_positions_read_as_silence() {
        let ring = ScopeRingBuffer::new(8).unwrap();
        assert_eq!(ring.snapshot(ScopeChannel::Left, 4), vec![0.0; 4]);

        ring.write(ScopeChannel::Left, &[1.0, 2.0]);
        assert_eq!(ring.snapshot(ScopeChannel::Left, 4), vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn write_longer_than_capacity_keeps_the_tail() {
        let ring = ScopeRingBuffer::new(4).unwrap();
        ring.write(ScopeChannel::Left, &[9.0]);
        ring.write(ScopeChannel::Left, &ramp(0..10));
        assert_eq!(ring.written(ScopeChannel::Left), 11);
        assert_eq!(ring.snapshot(ScopeChannel::Left, 4), ramp(6..10));
        // The ring position must stay aligned with the cursor afterwards.
        ring.write(ScopeChannel::Left, &[10.0]);
        assert_eq!(ring.snapshot(ScopeChannel::Left, 4), ramp(7..11));
    }

    #[test]
    fn channels_are_independent() {
        let ring = ScopeRingBuffer::new(4).unwrap();
        ring.write(ScopeChannel::Left, &[1.0, 1.0]);
        ring.write(ScopeChannel::Right, &[-1.0]);
        assert_eq!(ring.snapshot(ScopeChannel::Left, 2), vec![1.0, 1.0]);
        assert_eq!(ring.snapshot(ScopeChannel::Right, 2), vec![0.0, -1.0]);
    }

    #[test]
    fn clear_and_disable_zero_the_ring() {
        let ring = ScopeRingBuffer::new(4).unwrap();
        ring.write(ScopeChannel::Left, &[1.0, 2.0, 3.0]);
        ring.clear();
        assert_eq!(ring.written(ScopeChannel::Left), 0);
        assert_eq!(ring.snapshot(ScopeChannel::Left, 4), vec![0.0; 4]);

        ring.write(ScopeChannel::Left, &[5.0]);
        ring.set_enabled(false);
        ring.write(ScopeChannel::Left, &[6.0]);
        assert_eq!(ring.snapshot(ScopeChannel::Left, 4), vec![0.0; 4]);

        ring.set_enabled(true);
        ring.write(ScopeChannel::Left, &[7.0]);
        assert_eq!(ring.snapshot(ScopeChannel::Left, 1), vec![7.0]);
    }

    #[test]
    fn zero_capacity_is_an_allocation_failure() {
        let err = ScopeRingBuffer::new(0).unwrap_err();
        assert!(matches!(err, LoopScopeError::AllocationFailure { frames: 0 }));
    }

    #[test]
    fn snapshot_into_reuses_the_callers_buffer() {
        let ring = ScopeRingBuffer::new(8).unwrap();
        ring.write(ScopeChannel::Left, &ramp(0..6));
        let mut out = [0.0f32; 3];
        assert_eq!(ring.snapshot_into(ScopeChannel::Left, &mut out), 3);
        assert_eq!(out, [3.0, 4.0, 5.0]);

        let mut big = [f32::NAN; 12];
        assert_eq!(ring.snapshot_into(ScopeChannel::Left, &mut big), 8);
        assert_eq!(&big[..8], &[0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(big[8].is_nan());
    }

    #[test]
    fn concurrent_reader_never_blocks_the_writer() {
        let ring = Arc::new(ScopeRingBuffer::new(256).unwrap());
        let reader = ScopeReader::new(Arc::clone(&ring));
        let writer_ring = Arc::clone(&ring);

        let writer = std::thread::spawn(move || {
            let block: Vec<f32> = (0..64).map(|i| i as f32).collect();
            for _ in 0..5_000 {
                writer_ring.write(ScopeChannel::Left, &block);
            }
        });

        let mut reads = 0usize;
        while !writer.is_finished() {
            let snap = reader.read(ScopeChannel::Left, 128);
            assert_eq!(snap.len(), 128);
            assert!(snap.iter().all(|s| (0.0..64.0).contains(s)));
            reads += 1;
        }
        writer.join().unwrap();

        assert_eq!(ring.written(ScopeChannel::Left), 5_000 * 64);
        let tail = reader.read(ScopeChannel::Left, 64);
        assert_eq!(tail, (0..64).map(|i| i as f32).collect::<Vec<_>>());
        tracing::debug!(reads, "reader finished");
    }
}
