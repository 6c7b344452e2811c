//! Scripted pan gesture standing in for a touch surface.
//!
//! Each cycle presses (engaging the filter), sweeps the normalized position
//! across the pad for the first three quarters of the period, then releases
//! (bypassing the filter) for the last quarter.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureStep {
    /// Finger down at `(x, y)`, both in [0, 1].
    Pan { x: f32, y: f32 },
    /// Finger up.
    Released,
}

#[derive(Debug, Clone, Copy)]
pub struct SweepScript {
    period: Duration,
}

impl SweepScript {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(100)),
        }
    }

    /// Gesture state `elapsed` after the script started.
    pub fn step_at(&self, elapsed: Duration) -> GestureStep {
        let period = self.period.as_secs_f32();
        let phase = (elapsed.as_secs_f32() % period) / period;
        if phase >= 0.75 {
            return GestureStep::Released;
        }
        let t = phase / 0.75;
        // x rises then falls once per press; y drifts up across it.
        let x = 1.0 - (2.0 * t - 1.0).abs();
        let y = 0.1 + 0.8 * t;
        GestureStep::Pan { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn sweep_peaks_mid_press_and_releases_at_the_end() {
        let script = SweepScript::new(secs(4.0));
        assert_eq!(script.step_at(secs(0.0)), GestureStep::Pan { x: 0.0, y: 0.1 });

        match script.step_at(secs(1.5)) {
            GestureStep::Pan { x, y } => {
                assert!((x - 1.0).abs() < 1e-4, "x={x}");
                assert!((y - 0.5).abs() < 1e-4, "y={y}");
            }
            GestureStep::Released => panic!("expected pan at mid press"),
        }

        assert_eq!(script.step_at(secs(3.5)), GestureStep::Released);
    }

    #[test]
    fn script_repeats_every_period() {
        let script = SweepScript::new(secs(2.0));
        assert_eq!(script.step_at(secs(0.5)), script.step_at(secs(4.5)));
    }

    #[test]
    fn positions_stay_on_the_pad() {
        let script = SweepScript::new(secs(1.0));
        for ms in 0..1_000 {
            if let GestureStep::Pan { x, y } = script.step_at(Duration::from_millis(ms)) {
                assert!((0.0..=1.0).contains(&x));
                assert!((0.0..=1.0).contains(&y));
            }
        }
    }
}
