//! # Thermal Regulation Simulation
//!
//! Closed-loop model of a flashlight driver regulating its own temperature.
//!
//! ## Components
//!
//! - **Voltage sag**: battery droop over the run, `((T - t) / T)^(1/9)`
//! - **Thermal**: first-order emitter model behind a fixed-length delay line
//! - **Sensor**: damped, truncated, jittered and smoothed view of the delay line
//! - **Driver**: ties the pieces to the regulation controller tick by tick
//! - **Sweep**: independent runs over a set of configs
//!
//! ## Usage
//!
//! ```rust
//! use thermsim::config::SimulationConfig;
//! use thermsim::simulation::simulate;
//!
//! let config = SimulationConfig {
//!     random_seed: Some(7),
//!     ..Default::default()
//! };
//!
//! let output = simulate(&config).unwrap();
//! let summary = output.summary();
//! println!("peak {:.1} °C, {} stepdowns", summary.peak_true_temp_c, summary.stepdowns);
//! ```

pub mod driver;
pub mod noise;
pub mod output;
pub mod sensor;
pub mod sweep;
pub mod thermal;
pub mod voltage_sag;

use thiserror::Error;

use crate::config::ConfigError;

pub use driver::{simulate, SimulationDriver};
pub use noise::{NoiseSource, NullNoise, UniformJitter};
pub use output::{RunSummary, SimulationOutput, SimulationRecord};
pub use sensor::{SensorState, TemperatureSensor};
pub use sweep::{run_sweep, SweepResult};
pub use thermal::{ThermalModel, ThermalState};
pub use voltage_sag::{RuntimePolicy, SagDomainError, VoltageSagModel};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    NumericDomain(#[from] SagDomainError),
}
