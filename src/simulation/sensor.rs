//! # Driver-side Temperature Sensor
//!
//! What the firmware actually gets to read: the older half of the thermal
//! delay line, damped towards ambient (the thermistor is loosely coupled to
//! the emitter), truncated to an integer, jittered, and averaged over a short
//! smoothing window. Readings are reported in fixed point, scaled by the
//! `adjust` gain (4.0 = two fractional bits, as the firmware stores them).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::noise::NoiseSource;
use super::thermal::ThermalState;

/// Smoothing buffer of integer readings plus the fixed-point gain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    samples: VecDeque<i64>,
    adjust: f64,
}

impl SensorState {
    /// Pre-fill `length` slots with the (truncated) ambient temperature
    pub fn new(length: usize, ambient_c: f64, adjust: f64) -> Self {
        Self {
            samples: std::iter::repeat(ambient_c as i64).take(length).collect(),
            adjust,
        }
    }

    pub fn adjust(&self) -> f64 {
        self.adjust
    }

    pub fn samples(&self) -> impl Iterator<Item = i64> + '_ {
        self.samples.iter().copied()
    }

    fn mean(&self) -> f64 {
        self.samples.iter().sum::<i64>() as f64 / self.samples.len() as f64
    }

    fn push(&mut self, sample: i64) {
        self.samples.pop_front();
        self.samples.push_back(sample);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSensor {
    ambient_c: f64,
    coupling: f64,
    noise_amplitude: i64,
    sag_coupled: bool,
}

impl TemperatureSensor {
    pub fn new(ambient_c: f64, coupling: f64, noise_amplitude: u32, sag_coupled: bool) -> Self {
        Self {
            ambient_c,
            coupling,
            noise_amplitude: noise_amplitude as i64,
            sag_coupled,
        }
    }

    /// Take one reading and return it in fixed point (°C × adjust).
    ///
    /// `sag` only affects the reading when the sensor is sag-coupled; by
    /// default the sag reaches the sensor through the thermal state alone.
    pub fn sample(
        &self,
        thermal: &ThermalState,
        state: &mut SensorState,
        sag: f64,
        noise: &mut dyn NoiseSource,
    ) -> i64 {
        let seen = thermal.older_half_mean();
        let mut value = self.ambient_c + (seen - self.ambient_c) * self.coupling;
        if self.sag_coupled {
            value *= sag;
        }

        let jitter = noise
            .next_jitter()
            .clamp(-self.noise_amplitude, self.noise_amplitude);
        state.push(value as i64 + jitter);

        let floor = self.ambient_c * state.adjust;
        (state.mean() * state.adjust).max(floor) as i64
    }

    /// Convert a fixed-point reading back to °C
    pub fn to_celsius(reading: i64, adjust: f64) -> f64 {
        reading as f64 / adjust
    }
}
