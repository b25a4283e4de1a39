use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;

use super::physics::{chance, clamp_band, drift, jitter, power_from_cutting_speed};
use super::state::{
    SawmillState, TargetValues, CUTTING_SPEED_BAND, POWER_BAND, PRESSURE_BAND, TEMPERATURE_BAND,
    VIBRATION_BAND,
};

const PIECE_PROBABILITY: f64 = 0.2;
const RANDOM_ERROR_PROBABILITY: f64 = 0.01;

const POWER_ALARM_KW: f64 = 85.0;
const TEMPERATURE_ALARM_C: f64 = 55.0;
const VIBRATION_ALARM_MM_S: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlarmCause {
    HighPower(f64),
    HighTemperature(f64),
    HighVibration(f64),
    RandomError,
}

impl fmt::Display for AlarmCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmCause::HighPower(kw) => write!(f, "High power consumption alarm triggered: {kw:.1} kW"),
            AlarmCause::HighTemperature(c) => write!(f, "High temperature alarm triggered: {c:.1}°C"),
            AlarmCause::HighVibration(v) => write!(f, "High vibration alarm triggered: {v:.1} mm/s"),
            AlarmCause::RandomError => write!(f, "Random error triggered"),
        }
    }
}

/// What a single simulation tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// New value of `is_active` when the machine cycle flipped this tick.
    pub toggled: Option<bool>,
    pub alarm: Option<AlarmCause>,
    pub piece_produced: bool,
    pub alarms_cleared: bool,
}

/// Process model of the sawmill. Owns the set-points and the cycle clock; the
/// live values are passed in so they can come from the OPC UA address space.
#[derive(Debug, Clone)]
pub struct Sawmill {
    targets: TargetValues,
    toggle_period_secs: u32,
    last_toggle: Option<i64>,
}

impl Sawmill {
    pub fn new(targets: TargetValues, toggle_period_secs: u32) -> Self {
        Self {
            targets,
            toggle_period_secs: toggle_period_secs.max(1),
            last_toggle: None,
        }
    }

    pub fn targets(&self) -> &TargetValues {
        &self.targets
    }

    pub fn initial_state(&self) -> SawmillState {
        SawmillState::at_rest(&self.targets)
    }

    pub fn step<R: Rng + ?Sized>(
        &mut self,
        state: &mut SawmillState,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        // Decisions below use the flags as they were before the cycle flip.
        let was_active = state.is_active;
        let was_working = state.is_working;

        if self.cycle_due(now) {
            state.is_active = !was_active;
            state.is_working = !was_working;
            state.is_stopped = !state.is_active;
            outcome.toggled = Some(state.is_active);
            tracing::info!(
                "Toggled machine state - Active: {}, Working: {}",
                state.is_active,
                state.is_working
            );
        }

        if !was_active {
            return outcome;
        }

        let targets = &self.targets;

        state.cutting_speed = clamp_band(
            jitter(rng, targets.cutting_speed, 2.0),
            CUTTING_SPEED_BAND,
        );

        // ±5% around nominal
        state.motor_speed = jitter(rng, targets.motor_speed, 90.0);
        state.speed = state.motor_speed;

        state.power_consumption = clamp_band(
            jitter(
                rng,
                power_from_cutting_speed(targets.power_consumption, state.cutting_speed),
                1.0,
            ),
            POWER_BAND,
        );

        state.temperature = clamp_band(drift(rng, state.temperature, 0.2, 0.3), TEMPERATURE_BAND);
        state.vibration = clamp_band(drift(rng, state.vibration, 0.3, 0.3), VIBRATION_BAND);
        state.pressure = clamp_band(drift(rng, state.pressure, 2.0, 2.0), PRESSURE_BAND);

        if !was_working {
            return outcome;
        }

        if chance(rng, PIECE_PROBABILITY) {
            state.pieces_count = state.pieces_count.saturating_add(1);
            outcome.piece_produced = true;
        }

        let alarm = if state.power_consumption > POWER_ALARM_KW {
            Some(AlarmCause::HighPower(state.power_consumption))
        } else if state.temperature > TEMPERATURE_ALARM_C {
            Some(AlarmCause::HighTemperature(state.temperature))
        } else if state.vibration > VIBRATION_ALARM_MM_S {
            Some(AlarmCause::HighVibration(state.vibration))
        } else if chance(rng, RANDOM_ERROR_PROBABILITY) {
            Some(AlarmCause::RandomError)
        } else {
            None
        };

        match alarm {
            Some(AlarmCause::RandomError) => state.has_error = true,
            Some(_) => state.has_alarm = true,
            None => {
                state.has_alarm = false;
                state.has_error = false;
                outcome.alarms_cleared = true;
            }
        }

        if let Some(cause) = alarm {
            tracing::warn!("{}", cause);
        }
        outcome.alarm = alarm;

        outcome
    }

    fn cycle_due(&mut self, now: DateTime<Utc>) -> bool {
        let second = now.timestamp();
        if second.rem_euclid(i64::from(self.toggle_period_secs)) != 0 {
            return false;
        }
        if self.last_toggle == Some(second) {
            return false;
        }
        self.last_toggle = Some(second);
        true
    }
}

impl Default for Sawmill {
    fn default() -> Self {
        Self::new(TargetValues::default(), 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn running_state() -> SawmillState {
        SawmillState {
            is_active: true,
            is_working: true,
            is_stopped: false,
            ..SawmillState::default()
        }
    }

    #[test]
    fn initial_state_matches_targets() {
        let sawmill = Sawmill::default();
        let state = sawmill.initial_state();
        assert!(!state.is_active);
        assert!(!state.is_working);
        assert!(state.is_stopped);
        assert_eq!(state.cutting_speed, 20.0);
        assert_eq!(state.speed, 1800.0);
        assert_eq!(state.pieces_count, 0);
    }

    #[test]
    fn toggles_on_period_boundary() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = sawmill.initial_state();

        let outcome = sawmill.step(&mut state, at(1_700_000_000), &mut rng);
        assert_eq!(outcome.toggled, Some(true));
        assert!(state.is_active);
        assert!(state.is_working);
        assert!(!state.is_stopped);
    }

    #[test]
    fn does_not_toggle_off_boundary() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = sawmill.initial_state();

        let outcome = sawmill.step(&mut state, at(1_700_000_003), &mut rng);
        assert_eq!(outcome.toggled, None);
        assert!(state.is_stopped);
    }

    #[test]
    fn same_second_toggles_once() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = sawmill.initial_state();

        sawmill.step(&mut state, at(1_700_000_010), &mut rng);
        let second = sawmill.step(&mut state, at(1_700_000_010), &mut rng);
        assert_eq!(second.toggled, None);
        assert!(state.is_active);
    }

    #[test]
    fn inactive_tick_leaves_values_alone() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = sawmill.initial_state();
        let before = state.clone();

        sawmill.step(&mut state, at(1_700_000_001), &mut rng);
        assert_eq!(state, before);
    }

    #[test]
    fn toggle_tick_uses_previous_activity() {
        // Machine switches on this tick, but values only move from the next one.
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(9);
        let mut state = sawmill.initial_state();

        sawmill.step(&mut state, at(1_700_000_020), &mut rng);
        assert!(state.is_active);
        assert_eq!(state.temperature, 45.0);
        assert_eq!(state.cutting_speed, 20.0);
    }

    #[test]
    fn active_tick_keeps_values_in_bands() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = running_state();

        for i in 1..500 {
            // stay off the toggle boundary
            let secs = 1_700_000_000 + i * 10 + 1;
            sawmill.step(&mut state, at(secs), &mut rng);

            assert!((15.0..=25.0).contains(&state.cutting_speed));
            assert!((60.0..=90.0).contains(&state.power_consumption));
            assert!((40.0..=60.0).contains(&state.temperature));
            assert!((2.0..=10.0).contains(&state.vibration));
            assert!((150.0..=200.0).contains(&state.pressure));
            assert!((1710.0..1890.0).contains(&state.motor_speed));
            assert_eq!(state.speed, state.motor_speed);
        }
    }

    #[test]
    fn pieces_only_counted_while_working() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(8);
        let mut state = SawmillState {
            is_working: false,
            ..running_state()
        };

        for i in 1..200 {
            sawmill.step(&mut state, at(1_700_000_001 + i * 10), &mut rng);
        }
        assert_eq!(state.pieces_count, 0);

        state.is_working = true;
        for i in 1..200 {
            sawmill.step(&mut state, at(1_700_100_001 + i * 10), &mut rng);
        }
        assert!(state.pieces_count > 0);
    }

    #[test]
    fn high_temperature_raises_alarm() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = SawmillState {
            temperature: 59.9,
            ..running_state()
        };

        let outcome = sawmill.step(&mut state, at(1_700_000_001), &mut rng);
        assert!(matches!(outcome.alarm, Some(AlarmCause::HighTemperature(_))));
        assert!(state.has_alarm);
    }

    #[test]
    fn high_vibration_raises_alarm() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = SawmillState {
            vibration: 9.9,
            ..running_state()
        };

        let outcome = sawmill.step(&mut state, at(1_700_000_001), &mut rng);
        assert!(matches!(outcome.alarm, Some(AlarmCause::HighVibration(_))));
        assert!(state.has_alarm);
    }

    #[test]
    fn temperature_alarm_wins_over_vibration() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(4);
        let mut state = SawmillState {
            temperature: 59.9,
            vibration: 9.9,
            ..running_state()
        };

        let outcome = sawmill.step(&mut state, at(1_700_000_001), &mut rng);
        assert!(matches!(outcome.alarm, Some(AlarmCause::HighTemperature(_))));
    }

    #[test]
    fn high_power_raises_alarm_with_raised_target() {
        let targets = TargetValues {
            power_consumption: 95.0,
            ..TargetValues::default()
        };
        let mut sawmill = Sawmill::new(targets, 10);
        let mut rng = StdRng::seed_from_u64(6);
        let mut state = running_state();

        let outcome = sawmill.step(&mut state, at(1_700_000_001), &mut rng);
        // 95 - 4 - 1 is already at the 90 kW ceiling
        assert!(matches!(outcome.alarm, Some(AlarmCause::HighPower(_))));
        assert!(state.has_alarm);
    }

    #[test]
    fn nominal_conditions_eventually_clear_alarms() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(13);
        let mut state = SawmillState {
            has_alarm: true,
            has_error: true,
            ..running_state()
        };

        let mut cleared = false;
        for i in 1..50 {
            let outcome = sawmill.step(&mut state, at(1_700_000_001 + i * 10), &mut rng);
            if outcome.alarms_cleared {
                cleared = true;
                break;
            }
        }
        assert!(cleared);
        assert!(!state.has_alarm);
        assert!(!state.has_error);
    }

    #[test]
    fn alarm_does_not_clear_error_flag() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(21);
        let mut state = SawmillState {
            temperature: 59.9,
            has_error: true,
            ..running_state()
        };

        sawmill.step(&mut state, at(1_700_000_001), &mut rng);
        assert!(state.has_alarm);
        assert!(state.has_error);
    }

    #[test]
    fn piece_counter_saturates_at_max() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(31);
        let mut state = SawmillState {
            pieces_count: i64::MAX,
            ..running_state()
        };

        for i in 1..100 {
            sawmill.step(&mut state, at(1_700_000_001 + i * 10), &mut rng);
            assert_eq!(state.pieces_count, i64::MAX);
        }
    }

    #[test]
    fn random_error_sets_error_flag_only() {
        // Search for a seed whose first working tick rolls the 1% error.
        let hit = (0..20_000u64).find_map(|seed| {
            let mut sawmill = Sawmill::default();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = running_state();
            let outcome = sawmill.step(&mut state, at(1_700_000_001), &mut rng);
            (outcome.alarm == Some(AlarmCause::RandomError)).then_some((seed, state, outcome))
        });

        let (seed, state, outcome) = hit.expect("no seed triggered the random error");
        assert!(state.has_error);
        assert!(!state.has_alarm);
        assert!(!outcome.alarms_cleared);

        // Same roll with the alarm already latched leaves it latched.
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = SawmillState {
            has_alarm: true,
            ..running_state()
        };
        let outcome = sawmill.step(&mut state, at(1_700_000_001), &mut rng);
        assert_eq!(outcome.alarm, Some(AlarmCause::RandomError));
        assert!(state.has_error);
        assert!(state.has_alarm);
    }

    #[test]
    fn idle_machine_leaves_alarm_flags_untouched() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(12);

        let mut latched = SawmillState {
            is_working: false,
            has_alarm: true,
            has_error: true,
            ..running_state()
        };
        let outcome = sawmill.step(&mut latched, at(1_700_000_001), &mut rng);
        assert_eq!(outcome.alarm, None);
        assert!(!outcome.alarms_cleared);
        assert!(latched.has_alarm);
        assert!(latched.has_error);

        let mut hot = SawmillState {
            is_working: false,
            temperature: 59.9,
            ..running_state()
        };
        let outcome = sawmill.step(&mut hot, at(1_700_000_011), &mut rng);
        assert_eq!(outcome.alarm, None);
        assert!(!hot.has_alarm);
        assert!(!hot.has_error);
    }

    #[test]
    fn nan_reading_recovers_into_band() {
        let mut sawmill = Sawmill::default();
        let mut rng = StdRng::seed_from_u64(77);
        let mut state = SawmillState {
            temperature: f64::NAN,
            vibration: f64::NAN,
            pressure: f64::NAN,
            ..running_state()
        };

        sawmill.step(&mut state, at(1_700_000_001), &mut rng);
        assert_eq!(state.temperature, 60.0);
        assert_eq!(state.vibration, 10.0);
        assert_eq!(state.pressure, 200.0);
    }

    #[test]
    fn alarm_messages() {
        assert_eq!(
            AlarmCause::HighPower(86.04).to_string(),
            "High power consumption alarm triggered: 86.0 kW"
        );
        assert_eq!(AlarmCause::RandomError.to_string(), "Random error triggered");
    }
}
