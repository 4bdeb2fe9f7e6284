use std::{collections::BTreeMap, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client, Method, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use radiostat_common::{
    Error, LedColor, Program, Result, SetpointField, ThermostatMode, ThermostatState,
};

/// Device operations the presence run depends on.
pub trait Thermostat {
    async fn state(&self) -> Result<ThermostatState>;

    async fn program(&self, mode: ThermostatMode, day: &str) -> Result<Program>;

    async fn set_setpoint(&self, field: SetpointField, value: f64) -> Result<()>;
}

/// Display areas that accept text messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageArea {
    /// User message area.
    Uma,
    /// Price message area.
    Pma,
}

impl MessageArea {
    fn path(self) -> &'static str {
        match self {
            Self::Uma => "uma",
            Self::Pma => "pma",
        }
    }
}

/// REST client for a Radio Thermostat rooted at `<base>/tstat`.
#[derive(Debug, Clone)]
pub struct TstatClient {
    http: Client,
    root: Url,
}

impl TstatClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut root = Url::parse(base_url).map_err(|err| {
            Error::InvalidArgument(format!("invalid thermostat url {base_url:?}: {err}"))
        })?;
        if !matches!(root.scheme(), "http" | "https") {
            return Err(Error::InvalidArgument(format!(
                "unsupported thermostat url scheme {:?}",
                root.scheme()
            )));
        }

        let path = format!("{}/tstat", root.path().trim_end_matches('/'));
        root.set_path(&path);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Connection(err.to_string()))?;

        Ok(Self { http, root })
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub async fn set_led(&self, color: LedColor) -> Result<()> {
        let body = json!({ "energy_led": color.energy_led() });
        let response = self.call(Method::POST, "led", Some(&body)).await?;
        ensure_accepted(&response)
    }

    pub async fn message(&self, area: MessageArea, line: u8, text: &str) -> Result<()> {
        let body = json!({ "line": line, "message": text });
        let response = self.call(Method::POST, area.path(), Some(&body)).await?;
        ensure_accepted(&response)
    }

    fn endpoint(&self, suffix: &str) -> Url {
        let mut url = self.root.clone();
        if !suffix.is_empty() {
            let path = format!("{}/{}", url.path(), suffix);
            url.set_path(&path);
        }
        url
    }

    async fn call<B>(&self, method: Method, suffix: &str, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(suffix);
        debug!("{method} {url}");

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(connection_error)?;
        let raw = response.bytes().await.map_err(connection_error)?;
        serde_json::from_slice(&raw).map_err(|err| Error::Parse(err.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, suffix: &str) -> Result<T> {
        let value = self.call::<Value>(Method::GET, suffix, None).await?;
        serde_json::from_value(value).map_err(|err| Error::Parse(err.to_string()))
    }
}

impl Thermostat for TstatClient {
    async fn state(&self) -> Result<ThermostatState> {
        self.get("").await
    }

    async fn program(&self, mode: ThermostatMode, day: &str) -> Result<Program> {
        let name = mode.program_name()?;
        self.get(&format!("program/{name}/{day}")).await
    }

    async fn set_setpoint(&self, field: SetpointField, value: f64) -> Result<()> {
        let body = BTreeMap::from([(field, value)]);
        let response = self.call(Method::POST, "", Some(&body)).await?;
        ensure_accepted(&response)
    }
}

fn connection_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Connection(format!("request timed out: {err}"))
    } else {
        Error::Connection(err.to_string())
    }
}

/// Writes answer `{"success": 0}` or `{"error": "..."}`.
fn ensure_accepted(response: &Value) -> Result<()> {
    match response.get("error") {
        Some(message) => Err(Error::Rejected(
            message
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| message.to_string()),
        )),
        None => Ok(()),
    }
}
