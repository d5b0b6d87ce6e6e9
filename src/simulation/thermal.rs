//! # Emitter Thermal Model
//!
//! Single-pole lag towards the steady-state temperature of the current power
//! level, followed by a fixed-length delay line that models heat taking time
//! to travel from the emitter to the driver board.
//!
//! T' = T + (T_target - T) / thermal_mass
//!
//! T_target is the ramp's steady temperature raised to 1/1.01, a mild
//! compression that keeps high levels from settling exactly on the table value.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::{PowerLevel, RampTable};

const STEADY_TEMP_COMPRESSION: f64 = 1.0 / 1.01;

/// Delay line of emitter temperatures, oldest first, newest at the back.
/// Length is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalState {
    lag: VecDeque<f64>,
}

impl ThermalState {
    /// Pre-fill `length` slots with `ambient_c`
    pub fn new(length: usize, ambient_c: f64) -> Self {
        Self {
            lag: std::iter::repeat(ambient_c).take(length).collect(),
        }
    }

    /// Most recent emitter temperature
    pub fn emitter_temp_c(&self) -> f64 {
        self.lag.back().copied().unwrap_or_default()
    }

    /// Mean of the older half of the delay line (at least one slot).
    /// This is what a sensor some distance from the emitter sees.
    pub fn older_half_mean(&self) -> f64 {
        let half = (self.lag.len() / 2).max(1);
        self.lag.iter().take(half).sum::<f64>() / half as f64
    }

    pub fn len(&self) -> usize {
        self.lag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lag.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.lag.iter().copied()
    }

    fn push(&mut self, temp_c: f64) {
        self.lag.pop_front();
        self.lag.push_back(temp_c);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalModel {
    ambient_c: f64,
    thermal_mass: f64,
}

impl ThermalModel {
    pub fn new(ambient_c: f64, thermal_mass: f64) -> Self {
        Self {
            ambient_c,
            thermal_mass,
        }
    }

    /// Temperature the emitter heads towards at `level`
    pub fn target_temp_c(&self, ramp: &RampTable, level: PowerLevel) -> f64 {
        ramp.steady_temp_c(level).powf(STEADY_TEMP_COMPRESSION)
    }

    /// Advance one tick at `level` and return the new emitter temperature.
    ///
    /// `sag` scales the current rise above ambient before integrating: a
    /// weaker battery pushes less heat into the emitter.
    pub fn advance(
        &self,
        state: &mut ThermalState,
        ramp: &RampTable,
        level: PowerLevel,
        sag: f64,
    ) -> f64 {
        let target = self.target_temp_c(ramp, level);

        let current = self.ambient_c + sag * (state.emitter_temp_c() - self.ambient_c);
        let next = (current + (target - current) / self.thermal_mass).max(self.ambient_c);

        state.push(next);
        next
    }
}
