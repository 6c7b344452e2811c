//! # loopscope-core
//!
//! Real-time loop-playback engine with a live filter and a lock-free scope
//! tap - reusable SDK.
//!
//! ## Architecture
//!
//! ```text
//! SampleSource::load ──► AudioBuffer (immutable, Arc)
//!                              │
//!          output clock ──► LoopRenderer (device thread, zero-alloc)
//!                              │   ▲
//!                              │   └── FilterParameters ◄── gesture thread
//!                              ▼
//!                         LoopFilter ──► taps ──► device buffer
//!                                         │
//!                                  ScopeRingBuffer ──► ScopeReader ◄── display thread (~60 Hz)
//! ```
//!
//! The render callback never allocates, locks or logs. Everything crossing
//! threads goes through atomics; lifecycle control lives in [`AudioEngine`]
//! and the consumer API in [`LoopSession`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod engine;
pub mod error;
pub mod filter;
pub mod ipc;
pub mod session;
pub mod source;

// Convenience re-exports for downstream crates
pub use audio::{CpalBackend, ManualBackend, ManualClock, OutputBackend, OutputFormat};
pub use buffering::{ScopeChannel, ScopeReader, ScopeRingBuffer};
pub use engine::{
    tap::{BlockView, LevelTap, RenderTap},
    AudioEngine, EngineConfig, PlaybackState,
};
pub use error::{LoopScopeError, Result};
pub use filter::{FilterKind, FilterParam, FilterParameters, FilterSettings};
pub use ipc::events::{PlaybackStatus, PlaybackStatusEvent};
pub use session::{LoopSession, SessionConfig};
pub use source::{AudioBuffer, ResourceId, SampleSource};
