use crate::{
    error::Result,
    schedule::DaySchedule,
    types::{SetpointField, ThermostatState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Write,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Nobody is in range; the away temperature is written unconditionally.
    Away,
    /// Heating and the setpoint is below the home temperature.
    RaiseToHome,
    /// Cooling and the setpoint is above the home temperature.
    LowerToHome,
    /// The device did not report the current setpoint for the active mode.
    SetpointUnknown,
    AlreadySet,
    /// Cooling and the setpoint is already below the home temperature.
    AlreadyLower,
    /// Heating and the setpoint is already above the home temperature.
    AlreadyHigher,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub field: SetpointField,
    pub target_temp: f64,
    pub action: Action,
    pub reason: DecisionReason,
}

impl Decision {
    fn write(field: SetpointField, target_temp: f64, reason: DecisionReason) -> Self {
        Self {
            field,
            target_temp,
            action: Action::Write,
            reason,
        }
    }

    fn skip(field: SetpointField, target_temp: f64, reason: DecisionReason) -> Self {
        Self {
            field,
            target_temp,
            action: Action::Skip,
            reason,
        }
    }

    pub fn is_write(&self) -> bool {
        self.action == Action::Write
    }
}

/// Picks the setpoint write for one run. Fails with `DeviceOff` when the
/// device is idle.
pub fn decide(
    in_range: bool,
    state: &ThermostatState,
    schedule: &DaySchedule,
) -> Result<Decision> {
    let field = state.mode.setpoint_field()?;

    if !in_range {
        return Ok(Decision::write(
            field,
            schedule.away_temp(),
            DecisionReason::Away,
        ));
    }

    let home = schedule.home_temp();
    let Some(current) = state.setpoint(field) else {
        return Ok(Decision::write(field, home, DecisionReason::SetpointUnknown));
    };

    let decision = match field {
        SetpointField::TCool if current > home => {
            Decision::write(field, home, DecisionReason::LowerToHome)
        }
        SetpointField::THeat if current < home => {
            Decision::write(field, home, DecisionReason::RaiseToHome)
        }
        _ if current == home => Decision::skip(field, home, DecisionReason::AlreadySet),
        SetpointField::TCool => Decision::skip(field, home, DecisionReason::AlreadyLower),
        SetpointField::THeat => Decision::skip(field, home, DecisionReason::AlreadyHigher),
    };

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{error::Error, types::ThermostatMode};

    fn schedule() -> DaySchedule {
        DaySchedule::from_flat(&[360.0, 71.0, 480.0, 62.0, 1080.0, 70.0, 1320.0, 64.0]).unwrap()
    }

    fn cooling(t_cool: f64) -> ThermostatState {
        ThermostatState {
            mode: ThermostatMode::Cool,
            temp: Some(75.0),
            t_heat: None,
            t_cool: Some(t_cool),
        }
    }

    fn heating(t_heat: f64) -> ThermostatState {
        ThermostatState {
            mode: ThermostatMode::Heat,
            temp: Some(65.0),
            t_heat: Some(t_heat),
            t_cool: None,
        }
    }

    #[test]
    fn cooling_above_home_writes_home() {
        let decision = decide(true, &cooling(72.0), &schedule()).unwrap();

        assert_eq!(
            decision,
            Decision {
                field: SetpointField::TCool,
                target_temp: 70.0,
                action: Action::Write,
                reason: DecisionReason::LowerToHome,
            }
        );
    }

    #[test]
    fn cooling_below_home_is_left_alone() {
        let decision = decide(true, &cooling(68.0), &schedule()).unwrap();

        assert_eq!(decision.action, Action::Skip);
        assert_eq!(decision.reason, DecisionReason::AlreadyLower);
    }

    #[test]
    fn heating_below_home_writes_home() {
        let decision = decide(true, &heating(68.0), &schedule()).unwrap();

        assert_eq!(decision.field, SetpointField::THeat);
        assert_eq!(decision.target_temp, 70.0);
        assert_eq!(decision.reason, DecisionReason::RaiseToHome);
        assert!(decision.is_write());
    }

    #[test]
    fn heating_above_home_is_left_alone() {
        let decision = decide(true, &heating(72.0), &schedule()).unwrap();

        assert_eq!(decision.action, Action::Skip);
        assert_eq!(decision.reason, DecisionReason::AlreadyHigher);
    }

    #[test]
    fn matching_setpoint_is_skipped_in_both_modes() {
        for state in [cooling(70.0), heating(70.0)] {
            let decision = decide(true, &state, &schedule()).unwrap();
            assert_eq!(decision.action, Action::Skip);
            assert_eq!(decision.reason, DecisionReason::AlreadySet);
        }
    }

    #[test]
    fn away_is_written_regardless_of_current_value() {
        for state in [cooling(62.0), cooling(80.0), heating(62.0), heating(50.0)] {
            let decision = decide(false, &state, &schedule()).unwrap();
            assert_eq!(decision.target_temp, 62.0);
            assert_eq!(decision.action, Action::Write);
            assert_eq!(decision.reason, DecisionReason::Away);
        }
    }

    #[test]
    fn missing_current_setpoint_writes_home() {
        let mut state = heating(0.0);
        state.t_heat = None;

        let decision = decide(true, &state, &schedule()).unwrap();
        assert_eq!(decision.reason, DecisionReason::SetpointUnknown);
        assert_eq!(decision.target_temp, 70.0);
    }

    #[test]
    fn off_mode_is_refused() {
        let state = ThermostatState {
            mode: ThermostatMode::Off,
            temp: Some(70.0),
            t_heat: None,
            t_cool: None,
        };

        assert!(matches!(
            decide(false, &state, &schedule()),
            Err(Error::DeviceOff)
        ));
        assert!(matches!(
            decide(true, &state, &schedule()),
            Err(Error::DeviceOff)
        ));
    }
}
