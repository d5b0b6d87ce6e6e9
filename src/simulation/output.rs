use serde::{Deserialize, Serialize};

use crate::controller::{ControlPhase, RegulationAction};

/// One tick of observable state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub elapsed_seconds: f64,
    /// Emitter temperature (°C), not visible to the controller
    pub true_temp_c: f64,
    /// Fixed-point reading the controller acted on
    pub sensor_reading: i64,
    /// `sensor_reading` converted back to °C
    pub sensor_temp_c: f64,
    pub actual_level: usize,
    pub target_level: usize,
    pub sag_factor: f64,
    pub lumens: f64,
    pub action: RegulationAction,
    pub phase: ControlPhase,
    /// Only set in calibration mode
    pub calibrated_ceiling_c: Option<f64>,
}

/// Append-only series produced by one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    records: Vec<SimulationRecord>,
}

impl SimulationOutput {
    pub fn with_capacity(ticks: usize) -> Self {
        Self {
            records: Vec::with_capacity(ticks),
        }
    }

    pub fn push(&mut self, record: SimulationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SimulationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&SimulationRecord> {
        self.records.last()
    }

    pub fn into_records(self) -> Vec<SimulationRecord> {
        self.records
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            ticks: self.records.len(),
            ..Default::default()
        };

        for record in &self.records {
            summary.peak_true_temp_c = summary.peak_true_temp_c.max(record.true_temp_c);
            summary.peak_sensor_temp_c = summary.peak_sensor_temp_c.max(record.sensor_temp_c);
            match record.action {
                RegulationAction::StepDown => {
                    summary.stepdowns += 1;
                    summary
                        .first_stepdown_s
                        .get_or_insert(record.elapsed_seconds);
                }
                RegulationAction::StepDownBlocked => summary.blocked_stepdowns += 1,
                RegulationAction::StepUp => summary.stepups += 1,
                RegulationAction::Hold => {}
            }
        }

        if let Some(last) = self.records.last() {
            summary.duration_s = last.elapsed_seconds;
            summary.final_level = last.actual_level;
            summary.calibrated_ceiling_c = last.calibrated_ceiling_c;
        }
        summary
    }
}

impl<'a> IntoIterator for &'a SimulationOutput {
    type Item = &'a SimulationRecord;
    type IntoIter = std::slice::Iter<'a, SimulationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Aggregate view of a run, for logs and sweep tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks: usize,
    pub duration_s: f64,
    pub peak_true_temp_c: f64,
    pub peak_sensor_temp_c: f64,
    pub stepdowns: usize,
    pub blocked_stepdowns: usize,
    pub stepups: usize,
    pub first_stepdown_s: Option<f64>,
    pub final_level: usize,
    pub calibrated_ceiling_c: Option<f64>,
}
