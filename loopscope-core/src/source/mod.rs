//! Loop asset loading.
//!
//! A loop is a single WAV file addressed by a stable [`ResourceId`] relative to
//! a resource root. It is decoded once into a planar [`AudioBuffer`] and never
//! touched again; the renderer only ever reads it.
//!
//! Failures are permanent configuration errors and are reported with a
//! distinct variant per cause:
//!
//! | Cause | Error |
//! |-------|-------|
//! | file absent / id escapes the root | `MissingResource` |
//! | not WAV, bad header, >2 channels, odd bit depth, empty, truncated data | `UnsupportedFormat` |
//! | sample storage cannot be reserved | `AllocationFailure` |

pub mod buffer;

pub use buffer::AudioBuffer;

use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use crate::error::{LoopScopeError, Result};

/// Stable identifier of a bundled loop asset, e.g. `"Amen-break.wav"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Only plain relative paths are valid ids.
    fn is_contained(&self) -> bool {
        let path = Path::new(&self.0);
        !self.0.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves resource ids under a root directory and decodes them.
#[derive(Debug, Clone)]
pub struct SampleSource {
    root: PathBuf,
}

impl SampleSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for `id`, or `None` when the id tries to leave the root.
    pub fn resolve(&self, id: &ResourceId) -> Option<PathBuf> {
        id.is_contained().then(|| self.root.join(id.as_str()))
    }

    /// Load and decode the loop asset `id`.
    ///
    /// # Errors
    /// See the module table. No retries are attempted.
    pub fn load(&self, id: &ResourceId) -> Result<AudioBuffer> {
        let path = self
            .resolve(id)
            .ok_or_else(|| LoopScopeError::MissingResource { id: id.to_string() })?;
        debug!(path = %path.display(), "opening loop resource");

        let reader = WavReader::open(&path).map_err(|e| map_hound_error(id, e))?;
        let buffer = decode(id, reader)?;
        info!(
            id = id.as_str(),
            frames = buffer.frames(),
            channels = buffer.channel_count(),
            sample_rate = buffer.sample_rate(),
            "loop resource loaded"
        );
        Ok(buffer)
    }

    /// Decode an in-memory WAV asset (e.g. one embedded with `include_bytes!`).
    pub fn load_bytes(id: &ResourceId, bytes: &[u8]) -> Result<AudioBuffer> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| map_hound_error(id, e))?;
        decode(id, reader)
    }
}

fn map_hound_error(id: &ResourceId, err: hound::Error) -> LoopScopeError {
    match err {
        hound::Error::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
            LoopScopeError::MissingResource { id: id.to_string() }
        }
        hound::Error::IoError(e) => LoopScopeError::Io(e),
        other => LoopScopeError::UnsupportedFormat(format!("{id}: {other}")),
    }
}

/// Sample data that ends early or cannot be read is a corrupt asset.
fn corrupt(id: &ResourceId, err: hound::Error) -> LoopScopeError {
    LoopScopeError::UnsupportedFormat(format!("{id}: {err}"))
}

fn decode<R: Read>(id: &ResourceId, mut reader: WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 || channels > 2 {
        return Err(LoopScopeError::UnsupportedFormat(format!(
            "{id}: {channels} channels (expected mono or stereo)"
        )));
    }

    let frames = reader.duration() as usize;
    if frames == 0 {
        return Err(LoopScopeError::UnsupportedFormat(format!("{id}: empty sample")));
    }

    let mut planar: Vec<Vec<f32>> = Vec::with_capacity(channels);
    for _ in 0..channels {
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(frames)
            .map_err(|_| LoopScopeError::AllocationFailure { frames })?;
        planar.push(samples);
    }

    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => {
            for (i, sample) in reader.samples::<f32>().enumerate() {
                planar[i % channels].push(sample.map_err(|e| corrupt(id, e))?);
            }
        }
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = 1.0 / (1i64 << (bits - 1)) as f32;
            for (i, sample) in reader.samples::<i32>().enumerate() {
                let sample = sample.map_err(|e| corrupt(id, e))?;
                planar[i % channels].push(sample as f32 * scale);
            }
        }
        (format, bits) => {
            return Err(LoopScopeError::UnsupportedFormat(format!(
                "{id}: {bits}-bit {format:?} samples"
            )));
        }
    }

    AudioBuffer::from_planar(planar, spec.sample_rate)
}
