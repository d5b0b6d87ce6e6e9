//! # Voltage Sag Model
//!
//! Battery depletion modelled as a multiplicative derating factor:
//!
//! sag(t) = ((T - t) / T) ^ (1/9)
//!
//! Where T is the total runtime estimated from battery capacity. The curve
//! stays close to 1.0 for most of the discharge and collapses towards 0 at the
//! very end, which is roughly how a Li-ion cell behaves under constant load.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

const SAG_EXPONENT: f64 = 1.0 / 9.0;

/// The sag factor is only real-valued for `0 <= elapsed < total`
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("voltage sag undefined at {elapsed_s}s of a {total_runtime_s}s runtime")]
pub struct SagDomainError {
    pub elapsed_s: f64,
    pub total_runtime_s: f64,
}

/// Empirical runtime estimate: `mAh * seconds_per_100mah / 100 * safety_factor`.
///
/// The defaults reproduce `mAh * 60 / 100 * 1.5`, tuned against real
/// hardware. `total_runtime_seconds` bypasses the estimate entirely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimePolicy {
    pub seconds_per_100mah: f64,
    pub safety_factor: f64,
    pub total_runtime_seconds: Option<f64>,
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self {
            seconds_per_100mah: 60.0,
            safety_factor: 1.5,
            total_runtime_seconds: None,
        }
    }
}

impl RuntimePolicy {
    /// Whole seconds of simulated runtime for a battery of `capacity_mah`
    pub fn total_runtime_seconds(&self, capacity_mah: f64) -> Result<f64, ConfigError> {
        let seconds = match self.total_runtime_seconds {
            Some(explicit) => explicit,
            None => (capacity_mah * self.seconds_per_100mah / 100.0 * self.safety_factor).floor(),
        };

        if seconds.is_finite() && seconds > 0.0 {
            Ok(seconds)
        } else {
            Err(ConfigError::RuntimeTooShort(seconds))
        }
    }
}

/// Derating factor over a fixed total runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageSagModel {
    total_runtime_s: f64,
}

impl VoltageSagModel {
    pub fn new(total_runtime_s: f64) -> Self {
        Self { total_runtime_s }
    }

    pub fn total_runtime_s(&self) -> f64 {
        self.total_runtime_s
    }

    /// Factor in (0, 1] at `elapsed_s` seconds into the discharge
    pub fn sag_factor(&self, elapsed_s: f64) -> Result<f64, SagDomainError> {
        if !(0.0..self.total_runtime_s).contains(&elapsed_s) {
            return Err(SagDomainError {
                elapsed_s,
                total_runtime_s: self.total_runtime_s,
            });
        }

        let remaining = (self.total_runtime_s - elapsed_s) / self.total_runtime_s;
        Ok(remaining.powf(SAG_EXPONENT))
    }
}
