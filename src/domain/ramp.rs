//! # Ramp Tables
//!
//! A ramp maps each [`PowerLevel`] to a drive value and the temperature the
//! emitter settles at when that level is held. Both columns must be
//! non-decreasing; the controller relies on "lower level = cooler".

use super::types::{PowerLevel, RampEntry};
use crate::config::ConfigError;

/// 7135 regulator channel of the reference two-channel driver (64 levels).
const RAMP_7135: [u8; 64] = [
    4, 4, 5, 5, 5, 6, 6, 7, 8, 8, 9, 10, 11, 12, 13, 14, 15, 17, 18, 20, 22, 23, 25, 27, 30, 32,
    34, 37, 40, 42, 45, 48, 52, 55, 59, 62, 66, 70, 74, 79, 83, 88, 93, 98, 104, 109, 115, 121,
    127, 133, 140, 146, 153, 160, 168, 175, 183, 191, 200, 208, 217, 226, 236, 245,
];

/// Direct-drive FET channel of the reference two-channel driver (86 levels).
const RAMP_FET: [u8; 86] = [
    0, 2, 3, 4, 5, 7, 8, 9, 11, 12, 14, 15, 17, 18, 20, 22, 23, 25, 27, 29, 30, 32, 34, 36, 38,
    40, 42, 44, 47, 49, 51, 53, 56, 58, 60, 63, 66, 68, 71, 73, 76, 79, 82, 85, 87, 90, 93, 96,
    100, 103, 106, 109, 113, 116, 119, 123, 126, 130, 134, 137, 141, 145, 149, 153, 157, 161, 165,
    169, 173, 178, 182, 186, 191, 196, 200, 205, 210, 214, 219, 224, 229, 234, 239, 244, 250, 255,
];

/// The 7135 channel delivers roughly 1/57 of the FET's output per PWM step
const CHANNEL_RATIO_7135: f64 = 57.0;
/// Temperature rise (°C) of the 7135 channel at full PWM
const HEAT_SPAN_7135_C: f64 = 5.0;
/// Temperature rise (°C) of the FET channel at full PWM
const HEAT_SPAN_FET_C: f64 = 300.0;
const PWM_MAX: f64 = 255.0;

/// Validated, non-empty, monotonic ramp
#[derive(Debug, Clone, PartialEq)]
pub struct RampTable {
    entries: Vec<RampEntry>,
}

impl RampTable {
    /// Validate and wrap a list of ramp entries
    pub fn new(entries: Vec<RampEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyRampTable);
        }

        for entry in &entries {
            if !entry.power.is_finite() || entry.power < 0.0 {
                return Err(ConfigError::Negative {
                    field: "ramp_table.power",
                    value: entry.power,
                });
            }
            // powf() in the thermal model needs a positive base
            if !entry.steady_temp_c.is_finite() || entry.steady_temp_c <= 0.0 {
                return Err(ConfigError::NonPositive {
                    field: "ramp_table.steady_temp_c",
                    value: entry.steady_temp_c,
                });
            }
        }

        for (index, pair) in entries.windows(2).enumerate() {
            let (prev, next) = (pair[0], pair[1]);
            if next.power < prev.power {
                return Err(ConfigError::NonMonotonicRamp {
                    column: "power",
                    index: index + 1,
                    previous: prev.power,
                    value: next.power,
                });
            }
            if next.steady_temp_c < prev.steady_temp_c {
                return Err(ConfigError::NonMonotonicRamp {
                    column: "steady_temp_c",
                    index: index + 1,
                    previous: prev.steady_temp_c,
                    value: next.steady_temp_c,
                });
            }
        }

        Ok(Self { entries })
    }

    /// Build from `(power, steady_temp_c)` pairs
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        Self::new(pairs.into_iter().map(RampEntry::from).collect())
    }

    /// Two-channel 7135 + FET ramp (150 levels).
    ///
    /// FET levels run with the 7135 channel saturated, so their drive value is
    /// stacked on top of the 7135 maximum. That keeps the power column
    /// monotonic across the channel switch.
    pub fn crescendo(ambient_c: f64) -> Self {
        let low_max = RAMP_7135[RAMP_7135.len() - 1] as f64 / CHANNEL_RATIO_7135;

        let low = RAMP_7135.iter().map(|&x| {
            let x = x as f64;
            RampEntry::new(
                x / CHANNEL_RATIO_7135,
                ambient_c + x / PWM_MAX * HEAT_SPAN_7135_C,
            )
        });
        let high = RAMP_FET.iter().map(|&x| {
            let x = x as f64;
            RampEntry::new(
                low_max + x,
                ambient_c + HEAT_SPAN_7135_C + x / PWM_MAX * HEAT_SPAN_FET_C,
            )
        });

        Self {
            entries: low.chain(high).collect(),
        }
    }

    /// Single-channel ramp whose steady temperature is proportional to drive:
    /// `max(ambient, level / 255 * total_power * heat_span_c)`.
    pub fn linear_heat(
        levels: &[u8],
        ambient_c: f64,
        total_power: f64,
        heat_span_c: f64,
    ) -> Result<Self, ConfigError> {
        Self::from_pairs(levels.iter().map(|&lvl| {
            let lvl = lvl as f64;
            (lvl, (lvl / PWM_MAX * total_power * heat_span_c).max(ambient_c))
        }))
    }

    /// Number of levels (N)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed table; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest valid level
    pub fn max_level(&self) -> PowerLevel {
        // Non-empty by construction
        PowerLevel::new(self.entries.len(), self.entries.len()).unwrap_or(PowerLevel::MIN)
    }

    /// Build a level, checking it against this table's bounds
    pub fn level(&self, level: usize) -> Option<PowerLevel> {
        PowerLevel::new(level, self.entries.len())
    }

    pub fn entry(&self, level: PowerLevel) -> RampEntry {
        self.entries[level.index()]
    }

    pub fn power(&self, level: PowerLevel) -> f64 {
        self.entry(level).power
    }

    pub fn steady_temp_c(&self, level: PowerLevel) -> f64 {
        self.entry(level).steady_temp_c
    }

    pub fn entries(&self) -> &[RampEntry] {
        &self.entries
    }
}

impl From<RampTable> for Vec<RampEntry> {
    fn from(table: RampTable) -> Self {
        table.entries
    }
}
