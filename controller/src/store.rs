use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::warn;

use radiostat_common::{Config, Error};

const CONFIG_FILE: &str = "config";
const DEFAULT_DIR_NAME: &str = ".radiothermostat";
#[cfg(unix)]
const CREDENTIALS_MODE: u32 = 0o600;

/// Access tokens are treated as expired this long before their real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= expires_at,
            None => false,
        }
    }
}

/// Config directory holding `config` and the per-user credential cache.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `explicit` wins; otherwise `$HOME/.radiothermostat`.
    pub fn resolve(explicit: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }
        let home = std::env::var("HOME").context("HOME is not set and no config dir was given")?;
        Ok(Self::new(Path::new(&home).join(DEFAULT_DIR_NAME)))
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn credentials_path(&self, user: &str) -> PathBuf {
        self.dir.join(format!(".google_{user}"))
    }

    pub async fn load_config(&self) -> anyhow::Result<Config> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create config dir {}", self.dir.display()))?;

        let path = self.config_path();
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound { path }.into());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        Ok(Config::from_json(&raw)?)
    }

    /// A missing or unreadable cache yields `None`, which the caller treats as
    /// "authorization required".
    pub async fn load_credentials(&self, user: &str) -> Option<Credentials> {
        let path = self.credentials_path(user);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("failed to read credentials for {user}: {err}");
                return None;
            }
        };

        match serde_json::from_slice::<Credentials>(&raw) {
            Ok(credentials) => Some(credentials),
            Err(err) => {
                warn!("ignoring corrupt credentials for {user}: {err}");
                None
            }
        }
    }

    pub async fn save_credentials(
        &self,
        user: &str,
        credentials: &Credentials,
    ) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.credentials_path(user);
        let payload = serde_json::to_vec_pretty(credentials)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(CREDENTIALS_MODE);

        let mut file = options
            .open(&path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        // `mode` only applies on creation; tighten files left by older runs.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(CREDENTIALS_MODE))
                .await?;
        }
        file.write_all(&payload)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        file.flush().await?;
        Ok(())
    }
}
