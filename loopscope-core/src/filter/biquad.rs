//! RBJ biquad sections.
//!
//! Bandwidth is given in octaves and converted to `alpha` with the cookbook's
//! bandwidth form, so narrow bandwidths produce the resonant bump of a
//! "resonant" shelf.

use std::f32::consts::{LN_2, PI};

use serde::{Deserialize, Serialize};

/// Response shape of the interactive filter band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    ResonantHighShelf,
    ResonantLowShelf,
    Peaking,
}

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Unity gain, no filtering.
    pub fn passthrough() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Design one section.
    ///
    /// `freq` is pulled below 0.45 × `sample_rate` so the design stays stable
    /// on low-rate devices.
    pub fn design(
        kind: FilterKind,
        freq: f32,
        bandwidth_octaves: f32,
        gain_db: f32,
        sample_rate: f32,
    ) -> Self {
        let freq = freq.clamp(1.0, sample_rate * 0.45);
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 * (LN_2 / 2.0 * bandwidth_octaves * w0 / sin_w0).sinh();

        match kind {
            FilterKind::ResonantHighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
                Self {
                    b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
                    b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
                    b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
                    a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
                    a2: ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
                }
            }
            FilterKind::ResonantLowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
                Self {
                    b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
                    b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
                    b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
                    a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
                    a2: ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
                }
            }
            FilterKind::Peaking => {
                let a0 = 1.0 + alpha / a;
                Self {
                    b0: (1.0 + alpha * a) / a0,
                    b1: (-2.0 * cos_w0) / a0,
                    b2: (1.0 - alpha * a) / a0,
                    a1: (-2.0 * cos_w0) / a0,
                    a2: (1.0 - alpha / a) / a0,
                }
            }
        }
    }

    /// Magnitude response at DC (z = 1).
    pub fn dc_gain(&self) -> f32 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Magnitude response at Nyquist (z = -1).
    pub fn nyquist_gain(&self) -> f32 {
        (self.b0 - self.b1 + self.b2) / (1.0 - self.a1 + self.a2)
    }
}

/// Direct form I history for one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let out = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = out;
        out
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn db(gain: f32) -> f32 {
        20.0 * gain.abs().log10()
    }

    #[test]
    fn high_shelf_cuts_the_top_and_leaves_dc() {
        let c = BiquadCoeffs::design(FilterKind::ResonantHighShelf, 2_000.0, 1.0, -30.0, 48_000.0);
        assert_relative_eq!(db(c.dc_gain()), 0.0, epsilon = 0.05);
        assert_relative_eq!(db(c.nyquist_gain()), -30.0, epsilon = 0.5);
    }

    #[test]
    fn low_shelf_cuts_dc_and_leaves_the_top() {
        let c = BiquadCoeffs::design(FilterKind::ResonantLowShelf, 200.0, 1.0, -12.0, 48_000.0);
        assert_relative_eq!(db(c.dc_gain()), -12.0, epsilon = 0.1);
        assert_relative_eq!(db(c.nyquist_gain()), 0.0, epsilon = 0.1);
    }

    #[test]
    fn peaking_is_flat_far_from_center() {
        let c = BiquadCoeffs::design(FilterKind::Peaking, 1_000.0, 1.0, 9.0, 48_000.0);
        assert_relative_eq!(c.dc_gain(), 1.0, epsilon = 1e-3);
        assert_relative_eq!(c.nyquist_gain(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn zero_gain_designs_are_transparent() {
        for kind in [
            FilterKind::ResonantHighShelf,
            FilterKind::ResonantLowShelf,
            FilterKind::Peaking,
        ] {
            let c = BiquadCoeffs::design(kind, 3_000.0, 0.5, 0.0, 44_100.0);
            let mut state = BiquadState::default();
            for i in 0..64 {
                let x = ((i * 7) % 13) as f32 / 13.0 - 0.5;
                assert_relative_eq!(state.process(x, &c), x, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn frequency_above_nyquist_stays_stable() {
        let c = BiquadCoeffs::design(FilterKind::ResonantHighShelf, 40_000.0, 0.05, -30.0, 8_000.0);
        let mut state = BiquadState::default();
        let mut peak = 0.0f32;
        for i in 0..4_096 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            peak = peak.max(state.process(x, &c).abs());
        }
        assert!(peak.is_finite() && peak < 100.0, "peak={peak}");
    }
}
