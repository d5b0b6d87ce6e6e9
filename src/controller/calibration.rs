//! Thermal ceiling calibration.
//!
//! In calibration mode the light runs flat out and never steps down; the
//! ceiling is continuously re-derived from the current reading with half the
//! normal prediction lead. Whatever the ceiling is when the user stops
//! becomes the regulation limit.

use super::regulation::ReadingHistory;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalCalibrator {
    prediction_strength: u32,
    adjust: f64,
    max_ceiling_c: f64,
}

impl ThermalCalibrator {
    pub fn new(prediction_strength: u32, adjust: f64, max_ceiling_c: f64) -> Self {
        Self {
            prediction_strength,
            adjust,
            max_ceiling_c,
        }
    }

    /// Ceiling (whole °C) implied by the current history, capped at the
    /// configured maximum
    pub fn observe(&self, history: &ReadingHistory) -> f64 {
        let lead = 1i64 << self.prediction_strength.saturating_sub(1);
        let projected = history.latest() + history.delta() * lead;
        let ceiling_c = (projected as f64 / self.adjust).trunc();
        ceiling_c.min(self.max_ceiling_c)
    }
}
