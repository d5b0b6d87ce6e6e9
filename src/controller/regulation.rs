//! Thermal Regulation Controller
//!
//! Decides, once per tick, whether the power level should step down, step
//! up, or hold. The decision is driven by a *projected* reading: the latest
//! sensor value plus its recent delta scaled by a power-of-two lead factor.
//!
//! # Behaviour
//! - **Too hot** (projected above the ceiling): after more than `lowpass`
//!   consecutive hot ticks, step down in proportion to the overshoot, never
//!   below the lowest permissible level.
//! - **Too cold** (projected below the floor): after more than `lowpass / 2`
//!   consecutive cold ticks, step up by exactly one level, never above the
//!   requested target.
//! - **In band**: nothing happens and the counters keep their values.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use strum::Display;

use crate::config::SimulationConfig;
use crate::domain::PowerLevel;

/// Window of past fixed-point readings; the oldest entry is the reference
/// for the prediction delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingHistory {
    readings: VecDeque<i64>,
    capacity: usize,
}

impl ReadingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a reading. The first reading fills the whole window so the
    /// controller starts with a zero delta.
    pub fn push(&mut self, reading: i64) {
        if self.readings.is_empty() {
            self.readings.extend(std::iter::repeat(reading).take(self.capacity));
            return;
        }
        self.readings.pop_front();
        self.readings.push_back(reading);
    }

    pub fn latest(&self) -> i64 {
        self.readings.back().copied().unwrap_or_default()
    }

    pub fn oldest(&self) -> i64 {
        self.readings.front().copied().unwrap_or_default()
    }

    /// Change across the window
    pub fn delta(&self) -> i64 {
        self.latest() - self.oldest()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Consecutive hot/cold tick counters. At most one is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HysteresisCounters {
    pub overheat: u32,
    pub underheat: u32,
}

/// Immutable controller parameters, in fixed-point sensor units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegulationParams {
    pub ceiling: f64,
    pub floor: f64,
    pub prediction_strength: u32,
    pub attenuation_shift: u32,
    pub lowpass: u32,
    pub lowest_level: PowerLevel,
}

impl RegulationParams {
    pub fn from_config(config: &SimulationConfig, lowest_level: PowerLevel) -> Self {
        Self {
            ceiling: config.max_temp_c * config.sensor_adjust_gain,
            floor: config.min_temp_c * config.sensor_adjust_gain,
            prediction_strength: config.prediction_strength,
            attenuation_shift: config.overheat_attenuation_shift,
            lowpass: config.lowpass_threshold,
            lowest_level,
        }
    }
}

/// What the controller did this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegulationAction {
    Hold,
    StepDown,
    /// Stepdown was due but would have gone below the lowest permissible level
    StepDownBlocked,
    StepUp,
}

/// Where the controller sits after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlPhase {
    Stable,
    CoolingHold,
    CoolingAct,
    WarmingHold,
    WarmingAct,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegulationDecision {
    pub level: PowerLevel,
    pub action: RegulationAction,
    pub phase: ControlPhase,
    /// Projected reading the decision was based on (fixed point)
    pub projected: i64,
    /// Levels removed (or that would have been removed) by a stepdown
    pub exceed: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RegulationController {
    params: RegulationParams,
    counters: HysteresisCounters,
}

impl RegulationController {
    pub fn new(params: RegulationParams) -> Self {
        Self {
            params,
            counters: HysteresisCounters::default(),
        }
    }

    pub fn params(&self) -> &RegulationParams {
        &self.params
    }

    pub fn counters(&self) -> HysteresisCounters {
        self.counters
    }

    /// Projected reading: latest + delta * 2^prediction_strength
    pub fn project(&self, history: &ReadingHistory) -> i64 {
        history.latest() + history.delta() * (1i64 << self.params.prediction_strength)
    }

    /// Run one control tick at the current `actual` level
    pub fn step(
        &mut self,
        history: &ReadingHistory,
        actual: PowerLevel,
        target: PowerLevel,
    ) -> RegulationDecision {
        let projected = self.project(history);
        let projected_f = projected as f64;

        let mut level = actual;
        let mut action = RegulationAction::Hold;
        let mut exceed = None;

        if projected_f > self.params.ceiling {
            self.counters.underheat = 0;
            if self.counters.overheat > self.params.lowpass {
                self.counters.overheat = 0;

                // Overshoot truncates toward zero before the power-of-two divide
                let overshoot = (projected_f - self.params.ceiling) as i64;
                let levels = (overshoot / (1i64 << self.params.attenuation_shift)).max(1);
                exceed = Some(levels);

                match actual
                    .offset(-levels)
                    .filter(|stepdown| *stepdown >= self.params.lowest_level)
                {
                    Some(stepdown) => {
                        level = stepdown;
                        action = RegulationAction::StepDown;
                    }
                    None => action = RegulationAction::StepDownBlocked,
                }
            } else {
                self.counters.overheat += 1;
            }
        } else if projected_f < self.params.floor {
            self.counters.overheat = 0;
            if self.counters.underheat > self.params.lowpass / 2 {
                self.counters.underheat = 0;
                if actual < target {
                    if let Some(up) = actual.offset(1) {
                        level = up;
                        action = RegulationAction::StepUp;
                    }
                }
            } else {
                self.counters.underheat += 1;
            }
        }

        RegulationDecision {
            level,
            action,
            phase: self.phase(action),
            projected,
            exceed,
        }
    }

    fn phase(&self, action: RegulationAction) -> ControlPhase {
        match action {
            RegulationAction::StepDown => ControlPhase::CoolingAct,
            // Level unchanged: still cooling, nothing applied
            RegulationAction::StepDownBlocked => ControlPhase::CoolingHold,
            RegulationAction::StepUp => ControlPhase::WarmingAct,
            RegulationAction::Hold if self.counters.overheat > 0 => ControlPhase::CoolingHold,
            RegulationAction::Hold if self.counters.underheat > 0 => ControlPhase::WarmingHold,
            RegulationAction::Hold => ControlPhase::Stable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ceiling 200, floor 160 in fixed point (50°C / 40°C with adjust 4)
    fn params(lowest: usize) -> RegulationParams {
        RegulationParams {
            ceiling: 200.0,
            floor: 160.0,
            prediction_strength: 4,
            attenuation_shift: 6,
            lowpass: 8,
            lowest_level: PowerLevel::new(lowest, 150).unwrap(),
        }
    }

    fn level(n: usize) -> PowerLevel {
        PowerLevel::new(n, 150).unwrap()
    }

    fn steady(reading: i64) -> ReadingHistory {
        let mut history = ReadingHistory::new(8);
        history.push(reading);
        history
    }

    #[test]
    fn test_history_primes_with_first_reading() {
        let mut history = ReadingHistory::new(4);
        history.push(100);
        assert_eq!(history.len(), 4);
        assert_eq!(history.delta(), 0);

        history.push(104);
        assert_eq!(history.latest(), 104);
        assert_eq!(history.oldest(), 100);
        assert_eq!(history.delta(), 4);
    }

    #[test]
    fn test_projection_leads_by_power_of_two() {
        let controller = RegulationController::new(params(1));
        let mut history = ReadingHistory::new(4);
        history.push(100);
        history.push(103);
        assert_eq!(controller.project(&history), 103 + 3 * 16);

        history.push(101);
        history.push(99);
        history.push(98);
        // delta -5 against the oldest (103): negative lead
        assert_eq!(controller.project(&history), 98 - 5 * 16);
    }

    #[test]
    fn test_overheat_waits_for_lowpass_then_steps_down() {
        let mut controller = RegulationController::new(params(37));
        let history = steady(264);
        let actual = level(150);

        // lowpass 8: ticks 1..=9 only count
        for tick in 1..=9 {
            let decision = controller.step(&history, actual, actual);
            assert_eq!(decision.action, RegulationAction::Hold, "tick {tick}");
            assert_eq!(decision.phase, ControlPhase::CoolingHold);
            assert_eq!(controller.counters().overheat, tick);
        }

        let decision = controller.step(&history, actual, actual);
        // (264 - 200) >> 6 = 1
        assert_eq!(decision.action, RegulationAction::StepDown);
        assert_eq!(decision.exceed, Some(1));
        assert_eq!(decision.level, level(149));
        assert_eq!(controller.counters(), HysteresisCounters::default());
    }

    #[test]
    fn test_stepdown_proportional_to_overshoot() {
        let mut controller = RegulationController::new(params(37));
        let history = steady(200 + 64 * 5 + 10);
        let actual = level(150);

        let decision = (0..10)
            .map(|_| controller.step(&history, actual, actual))
            .last()
            .unwrap();
        assert_eq!(decision.exceed, Some(5));
        assert_eq!(decision.level, level(145));
    }

    #[test]
    fn test_small_overshoot_still_steps_one_level() {
        let mut controller = RegulationController::new(params(1));
        let history = steady(201);
        let actual = level(10);

        let decision = (0..10)
            .map(|_| controller.step(&history, actual, actual))
            .last()
            .unwrap();
        assert_eq!(decision.exceed, Some(1));
        assert_eq!(decision.level, level(9));
    }

    #[test]
    fn test_stepdown_blocked_at_floor() {
        let mut controller = RegulationController::new(params(37));
        let history = steady(400);
        let actual = level(38);

        let decision = (0..10)
            .map(|_| controller.step(&history, actual, actual))
            .last()
            .unwrap();
        // exceed = 200 >> 6 = 3, 38 - 3 = 35 < 37
        assert_eq!(decision.action, RegulationAction::StepDownBlocked);
        assert_eq!(decision.phase, ControlPhase::CoolingHold);
        assert_eq!(decision.level, actual);
        assert_eq!(controller.counters().overheat, 0);
    }

    #[test]
    fn test_underheat_recovers_one_level_faster() {
        let mut controller = RegulationController::new(params(1));
        let history = steady(120);
        let actual = level(100);
        let target = level(150);

        // lowpass / 2 = 4: ticks 1..=5 only count
        for _ in 0..5 {
            let decision = controller.step(&history, actual, target);
            assert_eq!(decision.action, RegulationAction::Hold);
            assert_eq!(decision.phase, ControlPhase::WarmingHold);
        }
        let decision = controller.step(&history, actual, target);
        assert_eq!(decision.action, RegulationAction::StepUp);
        assert_eq!(decision.level, level(101));
        assert_eq!(decision.phase, ControlPhase::WarmingAct);
    }

    #[test]
    fn test_no_step_up_beyond_target() {
        let mut controller = RegulationController::new(params(1));
        let history = steady(120);
        let actual = level(100);

        for _ in 0..50 {
            let decision = controller.step(&history, actual, actual);
            assert_eq!(decision.level, actual);
            assert_ne!(decision.action, RegulationAction::StepUp);
        }
    }

    #[test]
    fn test_in_band_keeps_counters() {
        let mut controller = RegulationController::new(params(1));
        let actual = level(100);

        for _ in 0..3 {
            controller.step(&steady(250), actual, actual);
        }
        assert_eq!(controller.counters().overheat, 3);

        let decision = controller.step(&steady(180), actual, actual);
        assert_eq!(decision.action, RegulationAction::Hold);
        assert_eq!(decision.phase, ControlPhase::CoolingHold);
        assert_eq!(controller.counters().overheat, 3);
        assert_eq!(controller.counters().underheat, 0);
    }

    #[test]
    fn test_opposite_condition_resets_counter() {
        let mut controller = RegulationController::new(params(1));
        let actual = level(100);

        for _ in 0..3 {
            controller.step(&steady(250), actual, actual);
        }
        controller.step(&steady(100), actual, actual);
        assert_eq!(
            controller.counters(),
            HysteresisCounters {
                overheat: 0,
                underheat: 1
            }
        );
    }

    #[test]
    fn test_ceiling_is_exclusive() {
        let mut controller = RegulationController::new(params(1));
        let actual = level(100);
        controller.step(&steady(200), actual, actual);
        assert_eq!(controller.counters(), HysteresisCounters::default());
    }

    proptest! {
        #[test]
        fn prop_counters_never_both_nonzero(readings in prop::collection::vec(60i64..400, 1..300)) {
            let mut controller = RegulationController::new(params(37));
            let mut history = ReadingHistory::new(8);
            let target = level(150);
            let mut actual = target;

            for reading in readings {
                history.push(reading);
                let decision = controller.step(&history, actual, target);
                let c = controller.counters();
                prop_assert!(c.overheat == 0 || c.underheat == 0);

                let moved = decision.level.get() as i64 - actual.get() as i64;
                prop_assert!(moved <= 1);
                if moved < 0 {
                    prop_assert_eq!(Some(-moved), decision.exceed);
                }
                prop_assert!(decision.level >= params(37).lowest_level || decision.level == actual);
                actual = decision.level;
            }
        }
    }
}
