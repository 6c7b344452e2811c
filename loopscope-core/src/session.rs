//! Consumer-facing API: one loop, one engine, one scope.
//!
//! A display layer calls [`LoopSession::scope`] on its refresh tick and a
//! gesture layer calls [`LoopSession::set_filter_sweep`] /
//! [`LoopSession::set_filter_bypass`]; neither ever waits on the audio thread.

use std::{path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audio::{CpalBackend, OutputBackend},
    buffering::{ScopeChannel, ScopeReader},
    engine::{AudioEngine, EngineConfig},
    error::Result,
    source::{AudioBuffer, ResourceId, SampleSource},
};

/// Loop asset bundled with the host application.
pub const DEFAULT_RESOURCE_ID: &str = "Amen-break.wav";

/// Where the loop comes from and how the engine is set up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Directory resource ids are resolved against.
    pub resource_root: PathBuf,
    /// Loop asset to play.
    pub resource_id: String,
    pub engine: EngineConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resource_root: PathBuf::from("assets"),
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
            engine: EngineConfig::default(),
        }
    }
}

pub struct LoopSession {
    engine: AudioEngine,
    reader: ScopeReader,
    resource: Option<ResourceId>,
}

impl LoopSession {
    /// Load the configured loop and build an engine on the cpal output.
    ///
    /// # Errors
    /// Resource errors from [`SampleSource::load`], or `AllocationFailure`.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let backend = CpalBackend::new(
            config.engine.preferred_device.clone(),
            config.engine.buffer_frames,
        );
        Self::open_with_backend(config, Arc::new(backend))
    }

    /// Like [`open`](Self::open) with an explicit output backend.
    pub fn open_with_backend(
        config: SessionConfig,
        backend: Arc<dyn OutputBackend>,
    ) -> Result<Self> {
        let id = ResourceId::new(config.resource_id);
        let buffer = SampleSource::new(&config.resource_root).load(&id)?;
        info!(
            resource = %id,
            frames = buffer.frames(),
            channels = buffer.channel_count(),
            "loop session opened"
        );
        let mut session = Self::from_buffer(config.engine, buffer, backend)?;
        session.resource = Some(id);
        Ok(session)
    }

    /// Build a session around an already decoded loop.
    pub fn from_buffer(
        config: EngineConfig,
        buffer: AudioBuffer,
        backend: Arc<dyn OutputBackend>,
    ) -> Result<Self> {
        let engine = AudioEngine::new(config, Arc::new(buffer), backend)?;
        let reader = engine.scope_reader();
        Ok(Self {
            engine,
            reader,
            resource: None,
        })
    }

    /// Start looping playback.
    ///
    /// # Errors
    /// `AlreadyRunning`, or `EngineStartFailure` when the output is
    /// unavailable (retry is allowed).
    pub fn start_loop(&self) -> Result<()> {
        self.engine.start()
    }

    /// Stop playback. Safe to call when already stopped.
    pub fn stop(&self) -> Result<()> {
        self.engine.stop()
    }

    /// The `n` most recent post-filter samples of `channel`, oldest first.
    ///
    /// Never fails: before playback, or for `n` past the scope capacity, the
    /// result is zero-filled or capped at the capacity.
    pub fn scope(&self, channel: ScopeChannel, n: usize) -> Vec<f32> {
        self.reader.read(channel, n)
    }

    /// Map a normalized 2-D gesture position onto the filter band.
    pub fn set_filter_sweep(&self, x: f32, y: f32) {
        self.engine.filter().apply_sweep(x, y);
    }

    /// Engage (`false`) or bypass (`true`) the filter as a gesture begins or
    /// ends.
    pub fn set_filter_bypass(&self, bypassed: bool) {
        self.engine.filter().apply_gesture_bypass(bypassed);
    }

    pub fn reader(&self) -> ScopeReader {
        self.reader.clone()
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    /// Resource the loop was loaded from, when opened from storage.
    pub fn resource(&self) -> Option<&ResourceId> {
        self.resource.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::ManualBackend, error::LoopScopeError};

    #[test]
    fn missing_asset_is_reported_as_resource_error() {
        let config = SessionConfig {
            resource_root: std::env::temp_dir().join("loopscope-no-such-root"),
            ..SessionConfig::default()
        };
        let err = LoopSession::open_with_backend(config, Arc::new(ManualBackend::default()))
            .err()
            .expect("missing asset");
        assert!(err.is_resource_error());
        assert!(matches!(err, LoopScopeError::MissingResource { .. }));
    }

    #[test]
    fn gestures_drive_the_filter_block() {
        let buffer = AudioBuffer::mono(vec![0.0; 16], 48_000).unwrap();
        let session = LoopSession::from_buffer(
            EngineConfig::default(),
            buffer,
            Arc::new(ManualBackend::default()),
        )
        .unwrap();

        session.set_filter_bypass(false);
        session.set_filter_sweep(1.0, 1.0);
        let settings = session.engine().filter().snapshot();
        assert!(!settings.bypassed);
        assert_eq!(settings.frequency, 9_500.0);
        assert_eq!(settings.bandwidth, 5.0);
        assert_eq!(settings.makeup_gain, 10.0);

        session.set_filter_bypass(true);
        let settings = session.engine().filter().snapshot();
        assert!(settings.bypassed);
        assert_eq!(settings.makeup_gain, 0.0);
    }

    #[test]
    fn scope_is_silent_before_playback() {
        let buffer = AudioBuffer::mono(vec![0.5; 16], 48_000).unwrap();
        let session = LoopSession::from_buffer(
            EngineConfig::default(),
            buffer,
            Arc::new(ManualBackend::default()),
        )
        .unwrap();
        assert_eq!(session.scope(ScopeChannel::Left, 32), vec![0.0; 32]);
        assert_eq!(session.resource(), None);
    }
}
