use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use radiostat_common::{Config, Coordinate};

use crate::store::{Credentials, Store};

pub const LATITUDE_SCOPE: &str = "https://www.googleapis.com/auth/latitude.current.best";
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationFix {
    Fix(Coordinate),
    NoData,
}

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("authorization required for {0}")]
    AuthorizationRequired(String),
    #[error("location request timed out")]
    Timeout,
    #[error("could not reach location service: {0}")]
    Connection(String),
    #[error("could not parse location response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for LocateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// Source of current user positions.
pub trait LocationProvider {
    async fn locate(&self, user: &str) -> Result<LocationFix, LocateError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_credentials(self, previous_refresh: Option<&str>) -> Credentials {
        Credentials {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }
}

/// OAuth installed-application flow against the configured endpoints.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
}

impl OAuthClient {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
        }
    }

    pub fn authorization_url(&self, user: &str) -> anyhow::Result<Url> {
        Url::parse_with_params(
            &self.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", OOB_REDIRECT_URI),
                ("scope", LATITUDE_SCOPE),
                ("access_type", "offline"),
                ("login_hint", user),
            ],
        )
        .with_context(|| format!("invalid auth_url {:?}", self.auth_url))
    }

    pub async fn exchange_code(&self, code: &str) -> anyhow::Result<Credentials> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", OOB_REDIRECT_URI),
            ])
            .send()
            .await
            .context("failed to reach token endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("authorization code rejected (HTTP {status}): {body}"));
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("failed to parse token response")?;
        Ok(token.into_credentials(None))
    }

    async fn refresh(&self, user: &str, refresh_token: &str) -> Result<Credentials, LocateError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            warn!("refresh token for {user} was rejected (HTTP {status})");
            return Err(LocateError::AuthorizationRequired(user.to_string()));
        }
        if !status.is_success() {
            return Err(LocateError::Connection(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into_credentials(Some(refresh_token)))
    }
}

/// Google Latitude `currentLocation` lookups with a per-user token cache.
#[derive(Debug, Clone)]
pub struct LatitudeProvider {
    http: Client,
    oauth: OAuthClient,
    store: Store,
    location_url: String,
    api_key: String,
}

impl LatitudeProvider {
    pub fn new(config: &Config, store: Store) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("failed to build location http client")?;

        Ok(Self {
            oauth: OAuthClient::new(http.clone(), config),
            http,
            store,
            location_url: config.location_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    async fn credentials(&self, user: &str) -> Result<Credentials, LocateError> {
        let Some(credentials) = self.store.load_credentials(user).await else {
            return Err(LocateError::AuthorizationRequired(user.to_string()));
        };

        if !credentials.is_expired(Utc::now()) {
            return Ok(credentials);
        }

        info!("refreshing expired access token for {user}");
        self.refresh(user, &credentials).await
    }

    async fn refresh(&self, user: &str, stale: &Credentials) -> Result<Credentials, LocateError> {
        let Some(refresh_token) = stale.refresh_token.as_deref() else {
            return Err(LocateError::AuthorizationRequired(user.to_string()));
        };

        let fresh = self.oauth.refresh(user, refresh_token).await?;
        if let Err(err) = self.store.save_credentials(user, &fresh).await {
            warn!("failed to cache refreshed credentials for {user}: {err:#}");
        }
        Ok(fresh)
    }

    /// `Ok(None)` when the service refuses the access token.
    async fn current_location(&self, access_token: &str) -> Result<Option<Value>, LocateError> {
        let response = self
            .http
            .get(&self.location_url)
            .query(&[("granularity", "best"), ("key", self.api_key.as_str())])
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LocateError::Connection(format!(
                "location service returned HTTP {status}"
            )));
        }

        let raw = response.bytes().await?;
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|err| LocateError::Parse(err.to_string()))
    }
}

impl LocationProvider for LatitudeProvider {
    async fn locate(&self, user: &str) -> Result<LocationFix, LocateError> {
        let credentials = self.credentials(user).await?;

        info!("Getting location for {user}");
        if let Some(body) = self.current_location(&credentials.access_token).await? {
            return Ok(parse_fix(&body));
        }

        // Tokens can be revoked before their recorded expiry.
        info!("access token for {user} was refused, refreshing");
        let fresh = self.refresh(user, &credentials).await?;
        match self.current_location(&fresh.access_token).await? {
            Some(body) => Ok(parse_fix(&body)),
            None => Err(LocateError::AuthorizationRequired(user.to_string())),
        }
    }
}

/// The fix may sit at the top level or under a `data` wrapper. Coordinates
/// arrive as numbers or numeric strings.
fn parse_fix(body: &Value) -> LocationFix {
    let fix = body.get("data").unwrap_or(body);

    let coordinate = |key: &str| match fix.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };

    match (coordinate("latitude"), coordinate("longitude")) {
        (Some(latitude), Some(longitude)) => {
            let point = Coordinate::new(latitude, longitude);
            if point.is_valid() {
                LocationFix::Fix(point)
            } else {
                warn!("discarding out of range location ({latitude}, {longitude})");
                LocationFix::NoData
            }
        }
        _ => LocationFix::NoData,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
        Form, Json, Router,
    };
    use serde_json::json;
    use tempfile::{tempdir, TempDir};
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Clone, Default)]
    struct Google {
        refreshes: Arc<AtomicUsize>,
    }

    async fn current_location(headers: HeaderMap) -> (AxumStatus, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        match auth {
            "Bearer fresh" | "Bearer valid" => (
                AxumStatus::OK,
                Json(json!({
                    "data": {"kind": "latitude#location", "latitude": 44.98, "longitude": -93.27}
                })),
            ),
            "Bearer nofix" => (
                AxumStatus::OK,
                Json(json!({"data": {"kind": "latitude#location"}})),
            ),
            _ => (
                AxumStatus::UNAUTHORIZED,
                Json(json!({"error": "invalid_token"})),
            ),
        }
    }

    async fn token(
        State(google): State<Google>,
        Form(form): Form<std::collections::HashMap<String, String>>,
    ) -> (AxumStatus, Json<Value>) {
        let grant = form.get("grant_type").map(String::as_str);
        let refresh = form.get("refresh_token").map(String::as_str);
        match (grant, refresh) {
            (Some("refresh_token"), Some("good-refresh")) => {
                google.refreshes.fetch_add(1, Ordering::Relaxed);
                (
                    AxumStatus::OK,
                    Json(json!({"access_token": "fresh", "expires_in": 3600})),
                )
            }
            _ => (
                AxumStatus::BAD_REQUEST,
                Json(json!({"error": "invalid_grant"})),
            ),
        }
    }

    async fn fake_google(google: Google) -> String {
        let app = Router::new()
            .route("/latitude/v1/currentLocation", get(current_location))
            .route("/o/oauth2/token", post(token))
            .with_state(google);
        serve(app).await
    }

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(base: &str) -> Config {
        let raw = json!({
            "users": {"alice": 0},
            "home_lat": 44.9778,
            "home_long": -93.265,
            "client_id": "id",
            "client_secret": "secret",
            "api_key": "key",
            "tstat_url": "http://127.0.0.1:9",
            "min_range": 10,
            "location_url": format!("{base}/latitude/v1/currentLocation"),
            "auth_url": format!("{base}/o/oauth2/auth"),
            "token_url": format!("{base}/o/oauth2/token"),
        });
        Config::from_json(raw.to_string().as_bytes()).unwrap()
    }

    /// The `TempDir` must outlive the provider so the cache stays on disk.
    fn provider_with(config: &Config) -> (LatitudeProvider, TempDir) {
        let dir = tempdir().unwrap();
        let provider = LatitudeProvider::new(config, Store::new(dir.path())).unwrap();
        (provider, dir)
    }

    fn provider(base: &str) -> (LatitudeProvider, TempDir) {
        provider_with(&config(base))
    }

    fn token_for(access: &str, refresh: Option<&str>, expired: bool) -> Credentials {
        let offset = if expired { -600 } else { 3600 };
        Credentials {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(offset)),
        }
    }

    #[test]
    fn parses_wrapped_and_bare_fixes() {
        assert_eq!(
            parse_fix(&json!({"data": {"latitude": 1.5, "longitude": 2.5}})),
            LocationFix::Fix(Coordinate::new(1.5, 2.5))
        );
        assert_eq!(
            parse_fix(&json!({"latitude": "10.25", "longitude": "-20.5"})),
            LocationFix::Fix(Coordinate::new(10.25, -20.5))
        );
        assert_eq!(parse_fix(&json!({"latitude": 1.0})), LocationFix::NoData);
        assert_eq!(
            parse_fix(&json!({"latitude": 91.0, "longitude": 0.0})),
            LocationFix::NoData
        );
    }

    #[test]
    fn authorization_url_carries_scope_and_user() {
        let config = config("https://accounts.example");
        let oauth = OAuthClient::new(Client::new(), &config);
        let url = oauth.authorization_url("alice@example.com").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["scope"], LATITUDE_SCOPE);
        assert_eq!(pairs["login_hint"], "alice@example.com");
        assert_eq!(pairs["client_id"], "id");
        assert_eq!(pairs["redirect_uri"], OOB_REDIRECT_URI);
    }

    #[tokio::test]
    async fn missing_credentials_require_authorization() {
        let base = fake_google(Google::default()).await;
        let (provider, _dir) = provider(&base);

        assert!(matches!(
            provider.locate("alice").await,
            Err(LocateError::AuthorizationRequired(user)) if user == "alice"
        ));
    }

    #[tokio::test]
    async fn valid_credentials_return_fix() {
        let base = fake_google(Google::default()).await;
        let (provider, _dir) = provider(&base);
        provider
            .store()
            .save_credentials("alice", &token_for("valid", None, false))
            .await
            .unwrap();

        assert_eq!(
            provider.locate("alice").await.unwrap(),
            LocationFix::Fix(Coordinate::new(44.98, -93.27))
        );
    }

    #[tokio::test]
    async fn response_without_coordinates_is_no_data() {
        let base = fake_google(Google::default()).await;
        let (provider, _dir) = provider(&base);
        provider
            .store()
            .save_credentials("alice", &token_for("nofix", None, false))
            .await
            .unwrap();

        assert_eq!(provider.locate("alice").await.unwrap(), LocationFix::NoData);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_cached() {
        let google = Google::default();
        let base = fake_google(google.clone()).await;
        let (provider, _dir) = provider(&base);
        provider
            .store()
            .save_credentials("alice", &token_for("stale", Some("good-refresh"), true))
            .await
            .unwrap();

        assert!(matches!(
            provider.locate("alice").await.unwrap(),
            LocationFix::Fix(_)
        ));
        assert_eq!(google.refreshes.load(Ordering::Relaxed), 1);

        let cached = provider.store().load_credentials("alice").await.unwrap();
        assert_eq!(cached.access_token, "fresh");
        assert_eq!(cached.refresh_token.as_deref(), Some("good-refresh"));
    }

    #[tokio::test]
    async fn rejected_refresh_requires_authorization() {
        let base = fake_google(Google::default()).await;
        let (provider, _dir) = provider(&base);
        provider
            .store()
            .save_credentials("alice", &token_for("stale", Some("revoked"), true))
            .await
            .unwrap();

        assert!(matches!(
            provider.locate("alice").await,
            Err(LocateError::AuthorizationRequired(_))
        ));
    }

    #[tokio::test]
    async fn revoked_access_token_requires_authorization() {
        let base = fake_google(Google::default()).await;
        let (provider, _dir) = provider(&base);
        provider
            .store()
            .save_credentials("alice", &token_for("revoked", None, false))
            .await
            .unwrap();

        assert!(matches!(
            provider.locate("alice").await,
            Err(LocateError::AuthorizationRequired(_))
        ));
    }

    #[tokio::test]
    async fn refused_access_token_is_refreshed_and_retried() {
        let google = Google::default();
        let base = fake_google(google.clone()).await;
        let (provider, _dir) = provider(&base);
        let revoked_early = Credentials {
            access_token: "revoked-early".into(),
            refresh_token: Some("good-refresh".into()),
            expires_at: None,
        };
        provider
            .store()
            .save_credentials("alice", &revoked_early)
            .await
            .unwrap();

        assert_eq!(
            provider.locate("alice").await.unwrap(),
            LocationFix::Fix(Coordinate::new(44.98, -93.27))
        );
        assert_eq!(google.refreshes.load(Ordering::Relaxed), 1);

        let cached = provider.store().load_credentials("alice").await.unwrap();
        assert_eq!(cached.access_token, "fresh");
    }

    #[tokio::test]
    async fn refused_access_token_with_rejected_refresh_requires_authorization() {
        let google = Google::default();
        let base = fake_google(google.clone()).await;
        let (provider, _dir) = provider(&base);
        provider
            .store()
            .save_credentials("alice", &token_for("revoked", Some("revoked"), false))
            .await
            .unwrap();

        assert!(matches!(
            provider.locate("alice").await,
            Err(LocateError::AuthorizationRequired(user)) if user == "alice"
        ));
        assert_eq!(google.refreshes.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn slow_location_service_is_a_timeout() {
        let app = Router::new().route(
            "/latitude/v1/currentLocation",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({"data": {"latitude": 44.98, "longitude": -93.27}}))
            }),
        );
        let base = serve(app).await;
        let mut config = config(&base);
        config.http_timeout_secs = 1;
        let (provider, _dir) = provider_with(&config);
        provider
            .store()
            .save_credentials("alice", &token_for("valid", None, false))
            .await
            .unwrap();

        assert!(matches!(
            provider.locate("alice").await,
            Err(LocateError::Timeout)
        ));
    }
}
