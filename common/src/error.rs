use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config file not found at {}. Create one first", .path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("authorization required for {user}")]
    AuthorizationRequired { user: String },

    #[error("could not connect to server: {0}")]
    Connection(String),

    #[error("could not parse json data: {0}")]
    Parse(String),

    /// The device answered a write with `{"error": ...}`.
    #[error("thermostat rejected request: {0}")]
    Rejected(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("A/C is off, not doing anything")]
    DeviceOff,

    #[error("Could not determine home/away temperatures. Does the thermostat have a schedule?")]
    ScheduleMissing,
}

impl Error {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigNotFound { .. } | Self::ConfigInvalid(_) => 3,
            Self::ScheduleMissing => 2,
            _ => 1,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
