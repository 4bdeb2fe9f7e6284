use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    schedule::DEFAULT_PROGRAM_DAY,
    types::Coordinate,
};

pub const DEFAULT_LOCATION_URL: &str = "https://www.googleapis.com/latitude/v1/currentLocation";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Contents of `<config_dir>/config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tracked accounts. Values are placeholders and ignored.
    pub users: BTreeMap<String, serde_json::Value>,
    pub home_lat: f64,
    pub home_long: f64,
    pub client_id: String,
    pub client_secret: String,
    pub api_key: String,
    pub tstat_url: String,
    #[serde(rename = "min_range")]
    pub min_range_miles: f64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_location_url")]
    pub location_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_program_day")]
    pub program_day: String,
}

impl Config {
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(raw).map_err(|err| Error::ConfigInvalid(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.home().is_valid() {
            return Err(Error::ConfigInvalid(format!(
                "home coordinate ({}, {}) is out of range",
                self.home_lat, self.home_long
            )));
        }
        if !self.min_range_miles.is_finite() || self.min_range_miles <= 0.0 {
            return Err(Error::ConfigInvalid(format!(
                "min_range must be a positive number of miles, got {}",
                self.min_range_miles
            )));
        }
        if !(self.tstat_url.starts_with("http://") || self.tstat_url.starts_with("https://")) {
            return Err(Error::ConfigInvalid(format!(
                "tstat_url must be an http(s) URL, got {:?}",
                self.tstat_url
            )));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::ConfigInvalid(
                "http_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn home(&self) -> Coordinate {
        Coordinate::new(self.home_lat, self.home_long)
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_location_url() -> String {
    DEFAULT_LOCATION_URL.to_string()
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_program_day() -> String {
    DEFAULT_PROGRAM_DAY.to_string()
}
