pub mod calibration;
pub mod regulation;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use calibration::ThermalCalibrator;
pub use regulation::{
    ControlPhase, HysteresisCounters, ReadingHistory, RegulationAction, RegulationController,
    RegulationDecision, RegulationParams,
};

/// How the driver uses the sensor reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegulationMode {
    /// Normal operation: step down when hot, recover when cool
    #[default]
    Regulate,
    /// Hold the target level and derive a ceiling from the readings
    Calibrate,
}
