//! Render-side counters.
//!
//! Bumped with relaxed atomics from the render thread and read from control
//! threads for observability. Values are approximate while rendering.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RenderDiagnostics {
    pub callbacks: AtomicU64,
    pub silent_callbacks: AtomicU64,
    pub blocks_rendered: AtomicU64,
    pub frames_rendered: AtomicU64,
    pub loop_wraps: AtomicU64,
    pub coefficient_updates: AtomicU64,
}

impl RenderDiagnostics {
    pub fn reset(&self) {
        self.callbacks.store(0, Ordering::Relaxed);
        self.silent_callbacks.store(0, Ordering::Relaxed);
        self.blocks_rendered.store(0, Ordering::Relaxed);
        self.frames_rendered.store(0, Ordering::Relaxed);
        self.loop_wraps.store(0, Ordering::Relaxed);
        self.coefficient_updates.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            silent_callbacks: self.silent_callbacks.load(Ordering::Relaxed),
            blocks_rendered: self.blocks_rendered.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            loop_wraps: self.loop_wraps.load(Ordering::Relaxed),
            coefficient_updates: self.coefficient_updates.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub callbacks: u64,
    pub silent_callbacks: u64,
    pub blocks_rendered: u64,
    pub frames_rendered: u64,
    pub loop_wraps: u64,
    pub coefficient_updates: u64,
}
