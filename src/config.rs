use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::controller::RegulationMode;
use crate::domain::{PowerLevel, RampEntry, RampTable};
use crate::simulation::voltage_sag::RuntimePolicy;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Largest shift accepted for the prediction/attenuation scale factors
pub const MAX_SHIFT: u32 = 16;

/// Configuration problems detected before the first tick
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("ramp table is empty")]
    EmptyRampTable,
    #[error("ramp table {column} column decreases at index {index}: {previous} -> {value}")]
    NonMonotonicRamp {
        column: &'static str,
        index: usize,
        previous: f64,
        value: f64,
    },
    #[error("{field} must be positive and finite, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{field} must be non-negative and finite, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} must be non-zero")]
    ZeroLength { field: &'static str },
    #[error("{field} = {value} is outside [1, {max}]")]
    LevelOutOfRange {
        field: &'static str,
        value: usize,
        max: usize,
    },
    #[error("battery_capacity_mah must be non-zero")]
    ZeroBatteryCapacity,
    #[error("min_temp_c ({min}) must be below max_temp_c ({max})")]
    InvertedBand { min: f64, max: f64 },
    #[error("{field} = {value} exceeds the supported maximum of {max}")]
    ShiftTooLarge {
        field: &'static str,
        value: u32,
        max: u32,
    },
    #[error("runtime policy yields {0} seconds of runtime; nothing to simulate")]
    RuntimeTooShort(f64),
}

/// Top-level application config: simulation parameters plus logging
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

/// Every tunable of one simulation run. Read-only once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Room temperature (°C); buffers start here and nothing cools below it
    pub ambient_temp_c: f64,
    /// Regulation ceiling (°C)
    pub max_temp_c: f64,
    /// Regulation floor (°C)
    pub min_temp_c: f64,
    /// Single-pole lag divisor; bigger heat sink = higher value
    pub thermal_mass: f64,
    /// Emitter-to-sensor propagation delay, in ticks
    pub lag_buffer_length: usize,
    /// Lead applied to the reading delta, as a power of two
    pub prediction_strength: u32,
    /// Divisor applied to the overshoot when sizing a stepdown, as a power of two
    pub overheat_attenuation_shift: u32,
    /// Consecutive out-of-band ticks required before acting
    pub lowpass_threshold: u32,
    /// Length of the sensor's smoothing buffer
    pub sensor_smoothing_length: usize,
    /// Length of the controller's reading history used for the delta
    pub history_length: usize,
    /// Fixed-point scale of sensor readings
    pub sensor_adjust_gain: f64,
    /// Fraction of the emitter's rise above ambient seen by the sensor
    pub sensor_coupling: f64,
    /// Also derate the sensor reading by the voltage sag factor
    pub sensor_sag_coupling: bool,
    /// Jitter bound; readings get noise in `[-amplitude, +amplitude]`
    pub noise_amplitude: u32,
    pub battery_capacity_mah: f64,
    pub timestep_seconds: f64,
    pub runtime: RuntimePolicy,
    pub ramp_table: Vec<RampEntry>,
    /// Never regulate below this level; defaults to N/4 (at least 1)
    pub lowest_permissible_level: Option<usize>,
    /// Level at tick 0; defaults to N
    pub starting_level: Option<usize>,
    /// Level the user asked for; recovery never exceeds it. Defaults to the starting level
    pub target_level: Option<usize>,
    /// Seed for the jitter source; `None` draws from OS entropy
    pub random_seed: Option<u64>,
    /// Scale of the lumens metric
    pub lumens_scale: f64,
    pub mode: RegulationMode,
    /// Upper bound for a calibrated ceiling (°C)
    pub max_calibrated_ceiling_c: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let ambient_temp_c = 22.0;
        Self {
            ambient_temp_c,
            max_temp_c: 50.0,
            min_temp_c: 40.0,
            thermal_mass: 32.0,
            lag_buffer_length: 8,
            prediction_strength: 4,
            overheat_attenuation_shift: 6,
            lowpass_threshold: 8,
            sensor_smoothing_length: 4,
            history_length: 8,
            sensor_adjust_gain: 4.0,
            sensor_coupling: 0.8,
            sensor_sag_coupling: false,
            noise_amplitude: 2,
            battery_capacity_mah: 700.0,
            timestep_seconds: 0.5,
            runtime: RuntimePolicy::default(),
            ramp_table: RampTable::crescendo(ambient_temp_c).into(),
            lowest_permissible_level: None,
            starting_level: None,
            target_level: None,
            random_seed: None,
            lumens_scale: 150.0,
            mode: RegulationMode::Regulate,
            max_calibrated_ceiling_c: 70.0,
        }
    }
}

/// Result of validating a [`SimulationConfig`]: the checked ramp, the
/// resolved levels and the run length.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub ramp: RampTable,
    pub starting_level: PowerLevel,
    pub target_level: PowerLevel,
    pub lowest_level: PowerLevel,
    pub total_runtime_s: f64,
}

impl SimulationConfig {
    /// Check every field and resolve defaulted levels.
    pub fn validate(&self) -> Result<RunPlan, ConfigError> {
        let ramp = RampTable::new(self.ramp_table.clone())?;

        finite("ambient_temp_c", self.ambient_temp_c)?;
        finite("max_temp_c", self.max_temp_c)?;
        finite("min_temp_c", self.min_temp_c)?;
        if self.min_temp_c >= self.max_temp_c {
            return Err(ConfigError::InvertedBand {
                min: self.min_temp_c,
                max: self.max_temp_c,
            });
        }

        positive("thermal_mass", self.thermal_mass)?;
        positive("timestep_seconds", self.timestep_seconds)?;
        positive("sensor_adjust_gain", self.sensor_adjust_gain)?;
        positive("sensor_coupling", self.sensor_coupling)?;
        positive("lumens_scale", self.lumens_scale)?;
        positive("max_calibrated_ceiling_c", self.max_calibrated_ceiling_c)?;

        non_zero("lag_buffer_length", self.lag_buffer_length)?;
        non_zero("sensor_smoothing_length", self.sensor_smoothing_length)?;
        non_zero("history_length", self.history_length)?;

        shift("prediction_strength", self.prediction_strength)?;
        shift("overheat_attenuation_shift", self.overheat_attenuation_shift)?;

        if self.battery_capacity_mah == 0.0 {
            return Err(ConfigError::ZeroBatteryCapacity);
        }
        positive("battery_capacity_mah", self.battery_capacity_mah)?;

        let total_runtime_s = self.runtime.total_runtime_seconds(self.battery_capacity_mah)?;

        let n = ramp.len();
        let starting_level = level(
            &ramp,
            "starting_level",
            self.starting_level.unwrap_or(n),
        )?;
        let target_level = level(
            &ramp,
            "target_level",
            self.target_level.unwrap_or(starting_level.get()),
        )?;
        let lowest_level = level(
            &ramp,
            "lowest_permissible_level",
            self.lowest_permissible_level.unwrap_or((n / 4).max(1)),
        )?;

        Ok(RunPlan {
            ramp,
            starting_level,
            target_level,
            lowest_level,
            total_runtime_s,
        })
    }

    /// Parameter line for chart titles and log headers
    pub fn title(&self) -> String {
        format!(
            "mAh: {}, Mass: {}, Lag: {}, Ramp: {}, Samples: {}, Predict: {}, Lowpass: {}, Att: {}",
            self.battery_capacity_mah,
            self.thermal_mass,
            self.lag_buffer_length,
            self.ramp_table.len(),
            self.history_length,
            self.prediction_strength,
            self.lowpass_threshold,
            self.overheat_attenuation_shift
        )
    }
}

impl fmt::Display for SimulationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_zero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::ZeroLength { field })
    } else {
        Ok(())
    }
}

fn shift(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value > MAX_SHIFT {
        Err(ConfigError::ShiftTooLarge {
            field,
            value,
            max: MAX_SHIFT,
        })
    } else {
        Ok(())
    }
}

fn level(ramp: &RampTable, field: &'static str, value: usize) -> Result<PowerLevel, ConfigError> {
    ramp.level(value).ok_or(ConfigError::LevelOutOfRange {
        field,
        value,
        max: ramp.len(),
    })
}

impl Config {
    /// `config/default.toml` (or `path`), then `THERMSIM__`-prefixed
    /// environment variables. Missing keys fall back to the built-in defaults.
    ///
    /// The default file is optional; an explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                ensure!(path.is_file(), "config file {} not found", path.display());
                Toml::file_exact(path)
            }
            None => Toml::file(DEFAULT_CONFIG_PATH),
        };
        let figment = Figment::new()
            .merge(file)
            .merge(Env::prefixed("THERMSIM__").split("__"));
        Ok(figment.extract()?)
    }
}
