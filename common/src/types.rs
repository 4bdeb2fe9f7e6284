use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Operating mode as reported by the `tmode` field of `GET /tstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ThermostatMode {
    Off,
    Heat,
    Cool,
}

impl ThermostatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
        }
    }

    /// Path segment of the program endpoint for this mode.
    pub fn program_name(self) -> Result<&'static str> {
        match self {
            Self::Heat => Ok("heat"),
            Self::Cool => Ok("cool"),
            Self::Off => Err(Error::InvalidArgument(
                "Invalid program mode: OFF".to_string(),
            )),
        }
    }

    /// Setpoint field that governs this mode. An idle device is never overridden.
    pub fn setpoint_field(self) -> Result<SetpointField> {
        match self {
            Self::Heat => Ok(SetpointField::THeat),
            Self::Cool => Ok(SetpointField::TCool),
            Self::Off => Err(Error::DeviceOff),
        }
    }
}

impl TryFrom<u8> for ThermostatMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::Heat),
            2 => Ok(Self::Cool),
            other => Err(Error::Parse(format!("unknown tmode {other}"))),
        }
    }
}

impl From<ThermostatMode> for u8 {
    fn from(mode: ThermostatMode) -> Self {
        match mode {
            ThermostatMode::Off => 0,
            ThermostatMode::Heat => 1,
            ThermostatMode::Cool => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SetpointField {
    #[serde(rename = "t_heat")]
    THeat,
    #[serde(rename = "t_cool")]
    TCool,
}

impl SetpointField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::THeat => "t_heat",
            Self::TCool => "t_cool",
        }
    }
}

impl fmt::Display for SetpointField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subset of the `GET /tstat` body. The device only reports the setpoint of
/// the active mode, so both setpoints are optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThermostatState {
    #[serde(rename = "tmode")]
    pub mode: ThermostatMode,
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub t_heat: Option<f64>,
    #[serde(default)]
    pub t_cool: Option<f64>,
}

impl ThermostatState {
    pub fn setpoint(&self, field: SetpointField) -> Option<f64> {
        match field {
            SetpointField::THeat => self.t_heat,
            SetpointField::TCool => self.t_cool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Energy LED colors accepted by `POST /tstat/led`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Off,
    Green,
    Orange,
    Red,
}

impl LedColor {
    pub fn energy_led(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Green => 1,
            Self::Orange => 2,
            Self::Red => 4,
        }
    }
}

impl FromStr for LedColor {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "green" => Ok(Self::Green),
            "orange" => Ok(Self::Orange),
            "red" => Ok(Self::Red),
            _ => Err(Error::InvalidArgument(format!("Invalid LED color: {value}"))),
        }
    }
}
