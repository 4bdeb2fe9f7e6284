pub mod config;
pub mod decision;
pub mod error;
pub mod geo;
pub mod presence;
pub mod schedule;
pub mod types;

pub use config::Config;
pub use decision::{decide, Action, Decision, DecisionReason};
pub use error::{Error, Result};
pub use geo::distance_miles;
pub use presence::{evaluate, PresenceReport, Verdict};
pub use schedule::{DaySchedule, Program, ProgramPeriod, DEFAULT_PROGRAM_DAY};
pub use types::{Coordinate, LedColor, SetpointField, ThermostatMode, ThermostatState};
