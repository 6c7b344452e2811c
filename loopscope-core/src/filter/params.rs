//! Lock-free filter control block.
//!
//! Written by the gesture thread, read once per render block by the audio
//! thread. Every field is its own atomic cell; a reader may observe a new
//! frequency together with an old bandwidth. That is fine for a continuous
//! control and avoids any lock the render thread could contend on.

use std::sync::atomic::{AtomicBool, Ordering};

use atomic_float::AtomicF32;
use serde::{Deserialize, Serialize};

pub const MIN_FREQUENCY_HZ: f32 = 20.0;
pub const MAX_FREQUENCY_HZ: f32 = 20_000.0;
pub const MIN_BANDWIDTH_OCTAVES: f32 = 0.05;
pub const MAX_BANDWIDTH_OCTAVES: f32 = 5.0;
pub const MIN_GAIN_DB: f32 = -96.0;
pub const MAX_GAIN_DB: f32 = 24.0;

/// Lower edge of the gesture sweep (x = 0).
pub const SWEEP_BASE_HZ: f32 = 500.0;
/// Sweep span added at x = 1.
pub const SWEEP_SPAN_HZ: f32 = 9_000.0;
/// Bandwidth at y = 1.
pub const SWEEP_MAX_BANDWIDTH: f32 = 5.0;
/// Make-up gain applied while a gesture holds the filter engaged.
pub const GESTURE_MAKEUP_GAIN_DB: f32 = 10.0;

/// Continuous filter controls addressable by [`FilterParameters::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterParam {
    /// Center / corner frequency in Hz.
    Frequency,
    /// Bandwidth in octaves.
    Bandwidth,
    /// Band gain in dB.
    Gain,
    /// Post-filter gain in dB, only applied when not bypassed.
    MakeupGain,
}

impl FilterParam {
    fn clamp(self, value: f32) -> f32 {
        match self {
            FilterParam::Frequency => value.clamp(MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ),
            FilterParam::Bandwidth => value.clamp(MIN_BANDWIDTH_OCTAVES, MAX_BANDWIDTH_OCTAVES),
            FilterParam::Gain | FilterParam::MakeupGain => value.clamp(MIN_GAIN_DB, MAX_GAIN_DB),
        }
    }
}

/// Plain snapshot of the control block, read once per render block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct FilterSettings {
    pub frequency: f32,
    pub bandwidth: f32,
    pub gain: f32,
    pub makeup_gain: f32,
    pub bypassed: bool,
}

impl Default for FilterSettings {
    /// A deep high-shelf cut that sits bypassed until a gesture engages it.
    fn default() -> Self {
        Self {
            frequency: SWEEP_BASE_HZ + SWEEP_SPAN_HZ * 0.5,
            bandwidth: 0.5,
            gain: -30.0,
            makeup_gain: 0.0,
            bypassed: true,
        }
    }
}

impl FilterSettings {
    /// Copy with every continuous field clamped into its legal range.
    pub fn clamped(self) -> Self {
        Self {
            frequency: clamp_finite(FilterParam::Frequency, self.frequency, 1_000.0),
            bandwidth: clamp_finite(FilterParam::Bandwidth, self.bandwidth, 0.5),
            gain: clamp_finite(FilterParam::Gain, self.gain, 0.0),
            makeup_gain: clamp_finite(FilterParam::MakeupGain, self.makeup_gain, 0.0),
            bypassed: self.bypassed,
        }
    }
}

fn clamp_finite(param: FilterParam, value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        param.clamp(value)
    } else {
        param.clamp(fallback)
    }
}

/// Atomic filter parameter block shared between control and render threads.
#[derive(Debug)]
pub struct FilterParameters {
    frequency: AtomicF32,
    bandwidth: AtomicF32,
    gain: AtomicF32,
    makeup_gain: AtomicF32,
    bypassed: AtomicBool,
}

impl FilterParameters {
    pub fn new(initial: FilterSettings) -> Self {
        let initial = initial.clamped();
        Self {
            frequency: AtomicF32::new(initial.frequency),
            bandwidth: AtomicF32::new(initial.bandwidth),
            gain: AtomicF32::new(initial.gain),
            makeup_gain: AtomicF32::new(initial.makeup_gain),
            bypassed: AtomicBool::new(initial.bypassed),
        }
    }

    fn cell(&self, param: FilterParam) -> &AtomicF32 {
        match param {
            FilterParam::Frequency => &self.frequency,
            FilterParam::Bandwidth => &self.bandwidth,
            FilterParam::Gain => &self.gain,
            FilterParam::MakeupGain => &self.makeup_gain,
        }
    }

    /// Store a clamped value. Non-finite values are ignored.
    #[inline]
    pub fn set(&self, param: FilterParam, value: f32) {
        if value.is_finite() {
            self.cell(param).store(param.clamp(value), Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn get(&self, param: FilterParam) -> f32 {
        self.cell(param).load(Ordering::Relaxed)
    }

    pub fn set_frequency(&self, hz: f32) {
        self.set(FilterParam::Frequency, hz);
    }

    pub fn set_bandwidth(&self, octaves: f32) {
        self.set(FilterParam::Bandwidth, octaves);
    }

    pub fn set_gain(&self, db: f32) {
        self.set(FilterParam::Gain, db);
    }

    pub fn set_makeup_gain(&self, db: f32) {
        self.set(FilterParam::MakeupGain, db);
    }

    #[inline]
    pub fn set_bypassed(&self, bypassed: bool) {
        self.bypassed.store(bypassed, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Relaxed)
    }

    /// Read every field once. Fields may come from different writes.
    #[inline]
    pub fn snapshot(&self) -> FilterSettings {
        FilterSettings {
            frequency: self.frequency.load(Ordering::Relaxed),
            bandwidth: self.bandwidth.load(Ordering::Relaxed),
            gain: self.gain.load(Ordering::Relaxed),
            makeup_gain: self.makeup_gain.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
        }
    }

    /// Overwrite every field from `settings`.
    pub fn store(&self, settings: FilterSettings) {
        let settings = settings.clamped();
        self.frequency.store(settings.frequency, Ordering::Relaxed);
        self.bandwidth.store(settings.bandwidth, Ordering::Relaxed);
        self.gain.store(settings.gain, Ordering::Relaxed);
        self.makeup_gain.store(settings.makeup_gain, Ordering::Relaxed);
        self.bypassed.store(settings.bypassed, Ordering::Relaxed);
    }

    /// Map a normalized 2-D gesture position onto frequency and bandwidth.
    ///
    /// `x` sweeps 500 Hz → 9500 Hz linearly, `y` sweeps bandwidth 0 → 5
    /// octaves (floored at the minimum bandwidth). Both are clamped to [0, 1].
    pub fn apply_sweep(&self, x: f32, y: f32) {
        let x = if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 };
        let y = if y.is_finite() { y.clamp(0.0, 1.0) } else { 0.0 };
        self.set_frequency(SWEEP_BASE_HZ + x * SWEEP_SPAN_HZ);
        self.set_bandwidth(y * SWEEP_MAX_BANDWIDTH);
    }

    /// Engage or release the filter the way a pan gesture does: engaging
    /// clears bypass and adds make-up gain, releasing restores neutral gain.
    pub fn apply_gesture_bypass(&self, bypassed: bool) {
        if bypassed {
            self.set_makeup_gain(0.0);
            self.set_bypassed(true);
        } else {
            self.set_makeup_gain(GESTURE_MAKEUP_GAIN_DB);
            self.set_bypassed(false);
        }
    }
}

impl Default for FilterParameters {
    fn default() -> Self {
        Self::new(FilterSettings::default())
    }
}
