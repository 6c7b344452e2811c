//! Interactive EQ stage.
//!
//! [`FilterParameters`] is the thread-safe control surface; [`LoopFilter`] is
//! the render-side stage that latches a parameter snapshot at each block
//! boundary and filters the block in place.

pub mod biquad;
pub mod params;

pub use biquad::{BiquadCoeffs, BiquadState, FilterKind};
pub use params::{FilterParam, FilterParameters, FilterSettings};

/// Stereo filter stage owned by the renderer.
///
/// `prepare` must be called once per block before `process`; it never
/// allocates and only redesigns coefficients when the settings changed.
#[derive(Debug, Clone)]
pub struct LoopFilter {
    kind: FilterKind,
    sample_rate: f32,
    coeffs: BiquadCoeffs,
    makeup: f32,
    states: [BiquadState; 2],
    applied: Option<FilterSettings>,
    bypassed: bool,
}

impl LoopFilter {
    pub fn new(kind: FilterKind, sample_rate: u32) -> Self {
        Self {
            kind,
            sample_rate: sample_rate as f32,
            coeffs: BiquadCoeffs::passthrough(),
            makeup: 1.0,
            states: [BiquadState::default(); 2],
            applied: None,
            bypassed: true,
        }
    }

    /// Latch `settings` for the coming block.
    ///
    /// Returns `true` when new coefficients were designed.
    pub fn prepare(&mut self, settings: &FilterSettings) -> bool {
        if settings.bypassed {
            if !self.bypassed {
                // Stale history would click when the band is re-engaged.
                self.states.iter_mut().for_each(BiquadState::reset);
                self.bypassed = true;
            }
            return false;
        }
        self.bypassed = false;

        let wanted = FilterSettings {
            bypassed: false,
            ..*settings
        };
        if self.applied == Some(wanted) {
            return false;
        }

        self.coeffs = BiquadCoeffs::design(
            self.kind,
            wanted.frequency,
            wanted.bandwidth,
            wanted.gain,
            self.sample_rate,
        );
        self.makeup = 10.0_f32.powf(wanted.makeup_gain / 20.0);
        self.applied = Some(wanted);
        true
    }

    /// Filter one block in place. A bypassed stage leaves samples untouched.
    #[inline]
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.bypassed {
            return;
        }
        let [state_l, state_r] = &mut self.states;
        for sample in left.iter_mut() {
            *sample = state_l.process(*sample, &self.coeffs) * self.makeup;
        }
        for sample in right.iter_mut() {
            *sample = state_r.process(*sample, &self.coeffs) * self.makeup;
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Coefficients currently in effect.
    pub fn coefficients(&self) -> BiquadCoeffs {
        self.coeffs
    }

    /// Settings the current coefficients were designed from.
    pub fn applied(&self) -> Option<FilterSettings> {
        self.applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engaged() -> FilterSettings {
        FilterSettings {
            bypassed: false,
            ..FilterSettings::default()
        }
    }

    #[test]
    fn bypassed_stage_is_sample_identical() {
        let mut filter = LoopFilter::new(FilterKind::ResonantHighShelf, 48_000);
        let mut left: Vec<f32> = (0..32).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut right = left.clone();
        let original = left.clone();

        assert!(!filter.prepare(&FilterSettings::default()));
        filter.process(&mut left, &mut right);
        assert_eq!(left, original);
        assert_eq!(right, original);
    }

    #[test]
    fn coefficients_are_only_redesigned_on_change() {
        let mut filter = LoopFilter::new(FilterKind::ResonantHighShelf, 48_000);
        let settings = engaged();
        assert!(filter.prepare(&settings));
        assert!(!filter.prepare(&settings));

        let moved = FilterSettings {
            frequency: 800.0,
            ..settings
        };
        assert!(filter.prepare(&moved));
        assert_eq!(filter.applied().map(|s| s.frequency), Some(800.0));
    }

    #[test]
    fn engaged_stage_attenuates_a_nyquist_tone() {
        let mut filter = LoopFilter::new(FilterKind::ResonantHighShelf, 48_000);
        filter.prepare(&FilterSettings {
            frequency: 2_000.0,
            ..engaged()
        });
        let mut left: Vec<f32> = (0..2_048).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut right = left.clone();
        filter.process(&mut left, &mut right);
        let tail_peak = left[1_024..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(tail_peak < 0.1, "tail_peak={tail_peak}");
    }
}
