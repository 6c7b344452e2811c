//! Terminal scope: pulls the newest window from the scope reader on every
//! display tick and draws a two-channel level meter.

use loopscope_core::{ScopeChannel, ScopeReader};
use serde::Serialize;

/// Levels of one displayed window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFrame {
    pub peak_left: f32,
    pub peak_right: f32,
    pub rms_left: f32,
    pub rms_right: f32,
}

/// Running totals kept for the shutdown summary.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayStats {
    pub frames_drawn: u64,
    pub max_peak: f32,
    pub last: ScopeFrame,
}

impl DisplayStats {
    pub fn record(&mut self, frame: ScopeFrame) {
        self.frames_drawn += 1;
        self.max_peak = self.max_peak.max(frame.peak_left).max(frame.peak_right);
        self.last = frame;
    }
}

pub struct ScopeDisplay {
    reader: ScopeReader,
    left: Vec<f32>,
    right: Vec<f32>,
    meter_width: usize,
}

impl ScopeDisplay {
    pub fn new(reader: ScopeReader, window: usize, meter_width: usize) -> Self {
        let window = window.clamp(1, reader.capacity());
        Self {
            reader,
            left: vec![0.0; window],
            right: vec![0.0; window],
            meter_width,
        }
    }

    /// Read the newest window of both channels.
    pub fn sample(&mut self) -> ScopeFrame {
        self.reader.read_into(ScopeChannel::Left, &mut self.left);
        self.reader.read_into(ScopeChannel::Right, &mut self.right);
        let (peak_left, rms_left) = levels(&self.left);
        let (peak_right, rms_right) = levels(&self.right);
        ScopeFrame {
            peak_left,
            peak_right,
            rms_left,
            rms_right,
        }
    }

    pub fn render_line(&self, frame: &ScopeFrame) -> String {
        format!(
            "L [{}] R [{}] peak {:>5.2}/{:>5.2}",
            meter(frame.rms_left, frame.peak_left, self.meter_width),
            meter(frame.rms_right, frame.peak_right, self.meter_width),
            frame.peak_left,
            frame.peak_right,
        )
    }
}

/// Absolute peak and RMS of `samples`.
pub fn levels(samples: &[f32]) -> (f32, f32) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let mut peak = 0.0f32;
    let mut sum_sq = 0.0f32;
    for &s in samples {
        peak = peak.max(s.abs());
        sum_sq += s * s;
    }
    (peak, (sum_sq / samples.len() as f32).sqrt())
}

/// `#` up to the RMS, `|` at the peak, spaces elsewhere.
pub fn meter(rms: f32, peak: f32, width: usize) -> String {
    let cells = |level: f32| ((level.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    let filled = cells(rms);
    let peak_at = cells(peak);
    (0..width)
        .map(|i| {
            if i < filled {
                '#'
            } else if peak_at > 0 && i == peak_at - 1 {
                '|'
            } else {
                ' '
            }
        })
        .collect()
}
