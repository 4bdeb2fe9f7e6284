use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

pub const DEFAULT_PROGRAM_DAY: &str = "0";

const PERIODS_PER_DAY: usize = 4;
const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgramPeriod {
    pub minutes_after_midnight: u16,
    pub temp_f: f64,
}

impl ProgramPeriod {
    fn from_pair(minutes: f64, temp_f: f64) -> Result<Self> {
        if !minutes.is_finite() || !(0.0..MINUTES_PER_DAY).contains(&minutes) {
            return Err(Error::Parse(format!(
                "program period starts at invalid minute {minutes}"
            )));
        }
        if !temp_f.is_finite() {
            return Err(Error::Parse(
                "program period temperature is not finite".into(),
            ));
        }

        Ok(Self {
            minutes_after_midnight: minutes as u16,
            temp_f,
        })
    }
}

/// One day of the device program: four periods in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaySchedule {
    pub morning: ProgramPeriod,
    pub away: ProgramPeriod,
    pub home: ProgramPeriod,
    pub sleep: ProgramPeriod,
}

impl DaySchedule {
    /// Builds a day from the device's flat `[time, temp, time, temp, ...]` layout.
    pub fn from_flat(values: &[f64]) -> Result<Self> {
        if values.len() < PERIODS_PER_DAY * 2 {
            return Err(Error::ScheduleMissing);
        }

        let period =
            |index: usize| ProgramPeriod::from_pair(values[index * 2], values[index * 2 + 1]);

        Ok(Self {
            morning: period(0)?,
            away: period(1)?,
            home: period(2)?,
            sleep: period(3)?,
        })
    }

    pub fn away_temp(&self) -> f64 {
        self.away.temp_f
    }

    pub fn home_temp(&self) -> f64 {
        self.home.temp_f
    }
}

/// Body of `GET /tstat/program/{mode}/{day}`: day index → flat period array.
///
/// Members are kept as raw JSON so an error-shaped body such as
/// `{"error": "..."}` still parses and simply has no usable day.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Program {
    days: BTreeMap<String, Value>,
}

impl Program {
    pub fn day(&self, slot: &str) -> Result<DaySchedule> {
        let values = self
            .days
            .get(slot)
            .and_then(Value::as_array)
            .ok_or(Error::ScheduleMissing)?;

        let flat = values
            .iter()
            .map(|value| {
                value.as_f64().ok_or_else(|| {
                    Error::Parse(format!("program day {slot} holds non-numeric {value}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        DaySchedule::from_flat(&flat)
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl FromIterator<(String, Vec<f64>)> for Program {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f64>)>>(iter: I) -> Self {
        Self {
            days: iter
                .into_iter()
                .map(|(slot, values)| (slot, Value::from(values)))
                .collect(),
        }
    }
}
