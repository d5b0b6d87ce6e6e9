//! # Simulation Driver
//!
//! Owns every piece of per-run state and advances it on a fixed timestep.
//! Each tick runs, in order:
//!
//! 1. voltage sag at the current elapsed time
//! 2. emitter temperature at the current level
//! 3. sensor reading
//! 4. controller decision (or calibration in calibration mode)
//! 5. one [`SimulationRecord`]
//!
//! The loop ends strictly before the sag model's total runtime, so the sag
//! factor is always evaluated inside its domain.

use tracing::{debug, info, warn};

use super::noise::{self, NoiseSource};
use super::output::{SimulationOutput, SimulationRecord};
use super::sensor::{SensorState, TemperatureSensor};
use super::thermal::{ThermalModel, ThermalState};
use super::voltage_sag::VoltageSagModel;
use super::SimulationError;
use crate::config::{ConfigError, RunPlan, SimulationConfig};
use crate::controller::{
    ControlPhase, HysteresisCounters, ReadingHistory, RegulationAction, RegulationController,
    RegulationMode, RegulationParams, ThermalCalibrator,
};
use crate::domain::PowerLevel;

/// Full scale of the PWM drive value
const PWM_MAX: f64 = 255.0;

pub struct SimulationDriver {
    config: SimulationConfig,
    plan: RunPlan,
    sag: VoltageSagModel,
    thermal: ThermalModel,
    sensor: TemperatureSensor,
    controller: RegulationController,
    calibrator: Option<ThermalCalibrator>,
    thermal_state: ThermalState,
    sensor_state: SensorState,
    history: ReadingHistory,
    noise: Box<dyn NoiseSource>,
    actual: PowerLevel,
    ticks: u64,
}

impl SimulationDriver {
    /// Validate `config` and build a driver whose jitter comes from the
    /// config's amplitude and seed
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        let noise = noise::from_config(config.noise_amplitude, config.random_seed);
        Self::with_noise(config, noise)
    }

    /// Validate `config` and build a driver with a caller-supplied noise source
    pub fn with_noise(
        config: SimulationConfig,
        noise: Box<dyn NoiseSource>,
    ) -> Result<Self, ConfigError> {
        let plan = config.validate()?;

        let calibrator = match config.mode {
            RegulationMode::Regulate => None,
            RegulationMode::Calibrate => Some(ThermalCalibrator::new(
                config.prediction_strength,
                config.sensor_adjust_gain,
                config.max_calibrated_ceiling_c,
            )),
        };
        // Calibration runs flat out at the requested level
        let actual = match config.mode {
            RegulationMode::Regulate => plan.starting_level,
            RegulationMode::Calibrate => plan.target_level,
        };

        Ok(Self {
            sag: VoltageSagModel::new(plan.total_runtime_s),
            thermal: ThermalModel::new(config.ambient_temp_c, config.thermal_mass),
            sensor: TemperatureSensor::new(
                config.ambient_temp_c,
                config.sensor_coupling,
                config.noise_amplitude,
                config.sensor_sag_coupling,
            ),
            controller: RegulationController::new(RegulationParams::from_config(
                &config,
                plan.lowest_level,
            )),
            calibrator,
            thermal_state: ThermalState::new(config.lag_buffer_length, config.ambient_temp_c),
            sensor_state: SensorState::new(
                config.sensor_smoothing_length,
                config.ambient_temp_c,
                config.sensor_adjust_gain,
            ),
            history: ReadingHistory::new(config.history_length),
            noise,
            actual,
            ticks: 0,
            plan,
            config,
        })
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    pub fn actual_level(&self) -> PowerLevel {
        self.actual
    }

    pub fn counters(&self) -> HysteresisCounters {
        self.controller.counters()
    }

    pub fn thermal_state(&self) -> &ThermalState {
        &self.thermal_state
    }

    pub fn sensor_state(&self) -> &SensorState {
        &self.sensor_state
    }

    /// Simulated seconds at the start of the next tick
    pub fn elapsed_s(&self) -> f64 {
        self.ticks as f64 * self.config.timestep_seconds
    }

    /// Ticks a full run will take
    pub fn expected_ticks(&self) -> usize {
        (self.plan.total_runtime_s / self.config.timestep_seconds).ceil() as usize
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_s() >= self.sag.total_runtime_s()
    }

    /// Advance one tick. Returns `None` once the runtime is used up.
    pub fn tick(&mut self) -> Result<Option<SimulationRecord>, SimulationError> {
        if self.is_finished() {
            return Ok(None);
        }
        let elapsed = self.elapsed_s();
        let sag = self.sag.sag_factor(elapsed)?;

        let true_temp_c =
            self.thermal
                .advance(&mut self.thermal_state, &self.plan.ramp, self.actual, sag);

        let reading = self.sensor.sample(
            &self.thermal_state,
            &mut self.sensor_state,
            sag,
            self.noise.as_mut(),
        );
        self.history.push(reading);

        let (action, phase, calibrated_ceiling_c) = match &self.calibrator {
            Some(calibrator) => (
                RegulationAction::Hold,
                ControlPhase::Stable,
                Some(calibrator.observe(&self.history)),
            ),
            None => {
                let decision =
                    self.controller
                        .step(&self.history, self.actual, self.plan.target_level);
                match decision.action {
                    RegulationAction::Hold => {}
                    action => debug!(
                        elapsed_s = elapsed,
                        %action,
                        from = %self.actual,
                        to = %decision.level,
                        projected = decision.projected,
                        exceed = ?decision.exceed,
                        "regulation action"
                    ),
                }
                self.actual = decision.level;
                (decision.action, decision.phase, None)
            }
        };

        let power = self.plan.ramp.power(self.actual);
        let lumens = sag.powi(2) * power / PWM_MAX * self.config.lumens_scale;

        self.ticks += 1;

        Ok(Some(SimulationRecord {
            elapsed_seconds: elapsed,
            true_temp_c,
            sensor_reading: reading,
            sensor_temp_c: TemperatureSensor::to_celsius(reading, self.config.sensor_adjust_gain),
            actual_level: self.actual.get(),
            target_level: self.plan.target_level.get(),
            sag_factor: sag,
            lumens,
            action,
            phase,
            calibrated_ceiling_c,
        }))
    }

    /// Run to the end of the battery and return the full series
    pub fn run(mut self) -> Result<SimulationOutput, SimulationError> {
        info!(
            params = %self.config.title(),
            mode = %self.config.mode,
            total_runtime_s = self.plan.total_runtime_s,
            starting_level = %self.plan.starting_level,
            target_level = %self.plan.target_level,
            lowest_level = %self.plan.lowest_level,
            "starting thermal simulation"
        );

        let mut output = SimulationOutput::with_capacity(self.expected_ticks());
        while let Some(record) = self.tick()? {
            output.push(record);
        }

        let summary = output.summary();
        info!(
            ticks = summary.ticks,
            peak_true_temp_c = summary.peak_true_temp_c,
            peak_sensor_temp_c = summary.peak_sensor_temp_c,
            stepdowns = summary.stepdowns,
            stepups = summary.stepups,
            final_level = summary.final_level,
            calibrated_ceiling_c = ?summary.calibrated_ceiling_c,
            "thermal simulation finished"
        );
        if summary.blocked_stepdowns > 0 {
            warn!(
                blocked = summary.blocked_stepdowns,
                lowest_level = %self.plan.lowest_level,
                "still overheating at the lowest permissible level"
            );
        }

        Ok(output)
    }
}

/// Validate `config` and run it to completion with its configured noise
pub fn simulate(config: &SimulationConfig) -> Result<SimulationOutput, SimulationError> {
    SimulationDriver::new(config.clone())?.run()
}
