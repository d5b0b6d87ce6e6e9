use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Power Level
// ============================================================================

/// 1-based index into a [`RampTable`](super::RampTable).
///
/// Level 1 is the dimmest entry, level N the brightest. Arithmetic on levels
/// happens in signed space (`i64`) so a proposed stepdown below 1 can be
/// rejected instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PowerLevel(usize);

impl PowerLevel {
    pub const MIN: PowerLevel = PowerLevel(1);

    /// Create a level, returning `None` for 0 or anything above `max`
    pub fn new(level: usize, max: usize) -> Option<Self> {
        (1..=max).contains(&level).then_some(Self(level))
    }

    /// Raw 1-based value
    pub fn get(self) -> usize {
        self.0
    }

    /// 0-based index into the ramp columns
    pub fn index(self) -> usize {
        self.0 - 1
    }

    /// Offset the level by `delta`, returning `None` if the result drops below 1
    pub fn offset(self, delta: i64) -> Option<Self> {
        let next = self.0 as i64 + delta;
        (next >= 1).then(|| Self(next as usize))
    }
}

impl fmt::Display for PowerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

// ============================================================================
// Ramp Entry
// ============================================================================

/// One row of a ramp table: drive power and the emitter temperature it
/// settles at when held indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampEntry {
    /// Drive value on the 0..=255 PWM scale (may exceed 255 for stacked channels)
    pub power: f64,
    /// Steady-state emitter temperature (°C)
    pub steady_temp_c: f64,
}

impl RampEntry {
    pub fn new(power: f64, steady_temp_c: f64) -> Self {
        Self {
            power,
            steady_temp_c,
        }
    }
}

impl From<(f64, f64)> for RampEntry {
    fn from((power, steady_temp_c): (f64, f64)) -> Self {
        Self::new(power, steady_temp_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_level_bounds() {
        assert!(PowerLevel::new(0, 3).is_none());
        assert!(PowerLevel::new(4, 3).is_none());
        assert_eq!(PowerLevel::new(3, 3).map(PowerLevel::index), Some(2));
    }

    #[test]
    fn test_power_level_offset() {
        let level = PowerLevel::new(3, 10).unwrap();
        assert_eq!(level.offset(-2).map(PowerLevel::get), Some(1));
        assert_eq!(level.offset(-3), None);
        assert_eq!(level.offset(1).map(PowerLevel::get), Some(4));
    }

    #[test]
    fn test_ramp_entry_from_tuple() {
        let entry: RampEntry = (100.0, 30.0).into();
        assert_eq!(entry.power, 100.0);
        assert_eq!(entry.steady_temp_c, 30.0);
    }
}
