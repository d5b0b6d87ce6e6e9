//! Parameter sweeps.
//!
//! Each config is an independent run with its own state and noise source, so
//! the runs fan out across the rayon pool. Results come back in input order.

use rayon::prelude::*;
use tracing::info_span;

use super::driver::simulate;
use super::output::{RunSummary, SimulationOutput};
use super::SimulationError;
use crate::config::SimulationConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    /// Position in the input slice
    pub index: usize,
    pub title: String,
    pub outcome: Result<SimulationOutput, SimulationError>,
}

impl SweepResult {
    pub fn summary(&self) -> Option<RunSummary> {
        self.outcome.as_ref().ok().map(SimulationOutput::summary)
    }
}

/// Run every config; one failing config does not stop the others
pub fn run_sweep(configs: &[SimulationConfig]) -> Vec<SweepResult> {
    configs
        .par_iter()
        .enumerate()
        .map(|(index, config)| {
            let title = config.title();
            let _span = info_span!("sweep_run", index, %title).entered();
            SweepResult {
                index,
                title,
                outcome: simulate(config),
            }
        })
        .collect()
}

/// Copies of `base` differing only in thermal mass
pub fn vary_thermal_mass(base: &SimulationConfig, masses: &[f64]) -> Vec<SimulationConfig> {
    masses
        .iter()
        .map(|&thermal_mass| SimulationConfig {
            thermal_mass,
            ..base.clone()
        })
        .collect()
}
