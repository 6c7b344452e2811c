//! `AudioEngine` - playback lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! AudioEngine::new(config, loop, backend)
//!     └─► start()   → scope cleared, output session thread spawned,
//!     │               device claimed, renderer built, state = Running
//!     └─► stop()    → running=false, session thread joined (stream dropped
//!                     on it), scope cleared, state = Stopped
//! ```
//!
//! `stop()` on a stopped engine is a no-op. `start()` on a running engine
//! returns `AlreadyRunning`. Every `start()` builds a fresh renderer, so a
//! restarted engine plays from the loop start with a cleared filter.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS, so the backend opens and drops
//! its stream on a dedicated `loopscope-output` thread. A bounded crossbeam
//! channel carries the open result back to `start()`; a second one carries
//! the stop signal.

pub mod diagnostics;
pub mod render;
pub mod tap;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    audio::{CpalBackend, OutputBackend, OutputFormat},
    buffering::{ScopeReader, ScopeRingBuffer, DEFAULT_SCOPE_CAPACITY},
    error::{LoopScopeError, Result},
    filter::{FilterKind, FilterParameters, FilterSettings},
    ipc::events::{PlaybackStatus, PlaybackStatusEvent},
    source::AudioBuffer,
};

use self::{
    diagnostics::{DiagnosticsSnapshot, RenderDiagnostics},
    render::{RendererFactory, DEFAULT_MAX_BLOCK_FRAMES},
    tap::RenderTap,
};

/// Status events buffered for slow subscribers.
const BROADCAST_CAP: usize = 64;

/// Configuration for `AudioEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Samples kept per scope channel. Default: 4096.
    pub scope_capacity: usize,
    /// Upper bound on frames per internal render block. Default: 4096.
    pub max_block_frames: usize,
    /// Response shape of the interactive band.
    pub filter_kind: FilterKind,
    /// Filter state at construction. Default: bypassed −30 dB shelf at 5 kHz.
    pub initial_filter: FilterSettings,
    /// Output device name. `None` uses the system default.
    pub preferred_device: Option<String>,
    /// Fixed device buffer size in frames. `None` lets the host decide.
    pub buffer_frames: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scope_capacity: DEFAULT_SCOPE_CAPACITY,
            max_block_frames: DEFAULT_MAX_BLOCK_FRAMES,
            filter_kind: FilterKind::default(),
            initial_filter: FilterSettings::default(),
            preferred_device: None,
            buffer_frames: None,
        }
    }
}

/// Engine state. No intermediate states are observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Running,
}

/// Handle on the thread that owns the output stream.
struct OutputSession {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
    format: OutputFormat,
}

/// The top-level engine handle.
///
/// `AudioEngine` is `Send + Sync`; lifecycle calls are expected to come from
/// one control thread at a time.
pub struct AudioEngine {
    config: EngineConfig,
    source: Arc<AudioBuffer>,
    backend: Arc<dyn OutputBackend>,
    params: Arc<FilterParameters>,
    scope: Arc<ScopeRingBuffer>,
    /// Extra taps, run after the scope tap. Applied on the next `start()`.
    taps: Mutex<Vec<Arc<dyn RenderTap>>>,
    /// `true` while the renderer should produce audio.
    running: Arc<AtomicBool>,
    state: Mutex<PlaybackState>,
    session: Mutex<Option<OutputSession>>,
    diagnostics: Arc<RenderDiagnostics>,
    status_tx: broadcast::Sender<PlaybackStatusEvent>,
}

impl AudioEngine {
    /// Create a stopped engine around a loaded loop.
    ///
    /// # Errors
    /// `AllocationFailure` when the scope buffer cannot be allocated.
    pub fn new(
        config: EngineConfig,
        source: Arc<AudioBuffer>,
        backend: Arc<dyn OutputBackend>,
    ) -> Result<Self> {
        let scope = Arc::new(ScopeRingBuffer::new(config.scope_capacity)?);
        let params = Arc::new(FilterParameters::new(config.initial_filter));
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        debug!(
            frames = source.frames(),
            channels = source.channel_count(),
            sample_rate = source.sample_rate(),
            backend = backend.name(),
            scope_capacity = config.scope_capacity,
            "engine created"
        );

        Ok(Self {
            config,
            source,
            backend,
            params,
            scope,
            taps: Mutex::new(Vec::new()),
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(PlaybackState::Stopped),
            session: Mutex::new(None),
            diagnostics: Arc::new(RenderDiagnostics::default()),
            status_tx,
        })
    }

    /// Create an engine on the cpal output selected by `config`.
    pub fn with_cpal(config: EngineConfig, source: Arc<AudioBuffer>) -> Result<Self> {
        let backend = CpalBackend::new(config.preferred_device.clone(), config.buffer_frames);
        Self::new(config, source, Arc::new(backend))
    }

    /// Register an extra render tap. Takes effect on the next `start()`.
    pub fn add_tap(&self, tap: Arc<dyn RenderTap>) {
        self.taps.lock().push(tap);
    }

    /// Claim the output and start looping.
    ///
    /// Blocks until the backend confirms the device is open (or fails).
    ///
    /// # Errors
    /// - `LoopScopeError::AlreadyRunning` if already started.
    /// - `LoopScopeError::EngineStartFailure` when the output cannot be
    ///   claimed; the engine stays stopped and `start()` may be retried.
    pub fn start(&self) -> Result<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(LoopScopeError::AlreadyRunning);
        }

        self.scope.clear();
        self.diagnostics.reset();
        self.running.store(true, Ordering::Release);

        let factory = self.renderer_factory();
        let backend = Arc::clone(&self.backend);
        let running = Arc::clone(&self.running);
        let (open_tx, open_rx) = crossbeam_channel::bounded::<Result<OutputFormat>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let spawned = thread::Builder::new()
            .name("loopscope-output".into())
            .spawn(move || {
                // The stream must be created and dropped on this thread.
                let stream = match backend.open(factory) {
                    Ok(stream) => stream,
                    Err(e) => {
                        running.store(false, Ordering::Release);
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };
                let _ = open_tx.send(Ok(stream.format()));

                // Parks until stop() signals or the engine goes away.
                let _ = stop_rx.recv();
                drop(stream);
            });

        let thread = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                return Err(self.fail_start(LoopScopeError::EngineStartFailure(format!(
                    "spawn output thread: {e}"
                ))));
            }
        };

        match open_rx.recv() {
            Ok(Ok(format)) => {
                *session = Some(OutputSession {
                    stop_tx,
                    thread,
                    format,
                });
                self.set_state(PlaybackState::Running, Some(self.backend.name().to_string()));
                info!(
                    backend = self.backend.name(),
                    sample_rate = format.sample_rate,
                    channels = format.channels,
                    "loop playback started"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                let e = match e {
                    e @ LoopScopeError::EngineStartFailure(_) => e,
                    other => LoopScopeError::EngineStartFailure(other.to_string()),
                };
                Err(self.fail_start(e))
            }
            Err(_) => {
                // Sender dropped without a message: the thread panicked.
                let _ = thread.join();
                Err(self.fail_start(LoopScopeError::EngineStartFailure(
                    "output thread exited before opening the device".into(),
                )))
            }
        }
    }

    /// Stop playback and release the output.
    ///
    /// No render callback runs after this returns. Stopping a stopped
    /// engine is a no-op.
    pub fn stop(&self) -> Result<()> {
        let mut session = self.session.lock();
        let Some(active) = session.take() else {
            return Ok(());
        };

        self.running.store(false, Ordering::Release);
        let _ = active.stop_tx.send(());
        if active.thread.join().is_err() {
            warn!("output session thread panicked during shutdown");
        }

        self.scope.clear();
        self.set_state(PlaybackState::Stopped, None);
        info!(frames = self.diagnostics.snapshot().frames_rendered, "loop playback stopped");
        Ok(())
    }

    /// Current playback state (snapshot).
    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PlaybackState::Running
    }

    /// Format negotiated by the active output, if running.
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.session.lock().as_ref().map(|s| s.format)
    }

    /// Live filter control surface.
    pub fn filter(&self) -> &Arc<FilterParameters> {
        &self.params
    }

    /// Pull handle on the scope buffer.
    pub fn scope_reader(&self) -> ScopeReader {
        ScopeReader::new(Arc::clone(&self.scope))
    }

    /// Turn scope capture on or off. Disabling clears the buffer.
    pub fn set_scope_enabled(&self, enabled: bool) {
        self.scope.set_enabled(enabled);
    }

    pub fn source(&self) -> &AudioBuffer {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of render counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Subscribe to playback status changes.
    pub fn subscribe_status(&self) -> broadcast::Receiver<PlaybackStatusEvent> {
        self.status_tx.subscribe()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn renderer_factory(&self) -> RendererFactory {
        let scope: Arc<dyn RenderTap> = Arc::clone(&self.scope) as Arc<dyn RenderTap>;
        self.taps.lock().iter().fold(
            RendererFactory::new(
                Arc::clone(&self.source),
                Arc::clone(&self.params),
                Arc::clone(&self.running),
                Arc::clone(&self.diagnostics),
            )
            .with_filter_kind(self.config.filter_kind)
            .with_max_block_frames(self.config.max_block_frames)
            .with_tap(scope),
            |factory, tap| factory.with_tap(Arc::clone(tap)),
        )
    }

    fn fail_start(&self, e: LoopScopeError) -> LoopScopeError {
        self.running.store(false, Ordering::Release);
        warn!(backend = self.backend.name(), "loop playback failed to start: {e}");
        let _ = self.status_tx.send(PlaybackStatusEvent {
            status: PlaybackStatus::Error,
            detail: Some(e.to_string()),
        });
        e
    }

    fn set_state(&self, state: PlaybackState, detail: Option<String>) {
        *self.state.lock() = state;
        let _ = self.status_tx.send(PlaybackStatusEvent {
            status: state.into(),
            detail,
        });
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.scope_capacity, 4096);
        assert_eq!(config.max_block_frames, 4096);
        assert_eq!(config.filter_kind, FilterKind::ResonantHighShelf);
        assert!(config.initial_filter.bypassed);
        assert_eq!(config.preferred_device, None);
    }

    #[test]
    fn config_deserializes_partial_camel_case_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "scopeCapacity": 1024, "filterKind": "peaking", "bufferFrames": 256 }"#,
        )
        .expect("parse config");
        assert_eq!(config.scope_capacity, 1024);
        assert_eq!(config.filter_kind, FilterKind::Peaking);
        assert_eq!(config.buffer_frames, Some(256));
        assert_eq!(config.max_block_frames, DEFAULT_MAX_BLOCK_FRAMES);
    }

    #[test]
    fn zero_scope_capacity_fails_construction() {
        let source = Arc::new(AudioBuffer::mono(vec![0.0; 4], 48_000).unwrap());
        let config = EngineConfig {
            scope_capacity: 0,
            ..EngineConfig::default()
        };
        let result = AudioEngine::new(
            config,
            source,
            Arc::new(crate::audio::ManualBackend::default()),
        );
        assert!(matches!(
            result.err(),
            Some(LoopScopeError::AllocationFailure { .. })
        ));
    }
}
