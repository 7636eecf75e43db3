//! OAuth2 client-credentials exchange against the identity provider.
//!
//! [`HttpIdpClient`] talks to a real IDP token endpoint. [`SimulatedIssuer`]
//! fabricates tokens for local development. [`IdpIssuer`] picks one of the two
//! from [`IdpConfig`].

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use gateway_std::env::ReadEnv;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::secs_or;

const ENV_IDP_URL: &str = "IDP_URL";
const ENV_IDP_TOKEN_PATH: &str = "IDP_TOKEN_PATH";
const ENV_IDP_SCOPE: &str = "IDP_SCOPE";
const ENV_IDP_TIMEOUT_SECS: &str = "IDP_TIMEOUT_SECS";
const ENV_IDP_SIMULATE: &str = "IDP_SIMULATE";

const DEFAULT_IDP_URL: &str = "https://idp.example.com";
const DEFAULT_TOKEN_PATH: &str = "/realms/phoenix/protocol/openid-connect/token";
const DEFAULT_SCOPE: &str = "openid profile";
const DEFAULT_IDP_TIMEOUT: Duration = Duration::from_secs(10);

const SIMULATED_LATENCY: Duration = Duration::from_millis(200);
const SIMULATED_EXPIRES_IN: u64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    #[error("failed to send request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("IDP returned error status: {status}, body: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse token response: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpConfig {
    pub base_url: String,
    pub token_path: String,
    /// Sent as the `scope` form field when non-empty.
    pub scope: String,
    pub timeout: Duration,
    /// Use [`SimulatedIssuer`] instead of calling the IDP.
    pub simulate: bool,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_IDP_URL.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            timeout: DEFAULT_IDP_TIMEOUT,
            simulate: false,
        }
    }
}

impl IdpConfig {
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let defaults = Self::default();
        Self {
            base_url: env.var(ENV_IDP_URL).unwrap_or(defaults.base_url),
            token_path: env.var(ENV_IDP_TOKEN_PATH).unwrap_or(defaults.token_path),
            scope: env.var(ENV_IDP_SCOPE).unwrap_or(defaults.scope),
            timeout: secs_or(env, ENV_IDP_TIMEOUT_SECS, defaults.timeout),
            simulate: env.parse_or(ENV_IDP_SIMULATE, false),
        }
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.token_path
        )
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Token endpoint response. Fields the gateway does not use (refresh token,
/// id token, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

pub trait TokenIssuer: Send + Sync + 'static {
    fn issue(
        &self,
        credentials: &ClientCredentials,
    ) -> impl Future<Output = Result<IssuedToken, IdpError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpIdpClient {
    http: reqwest::Client,
    token_url: String,
}

impl HttpIdpClient {
    pub fn new(config: &IdpConfig) -> Result<Self, IdpError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            token_url: config.token_url(),
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

impl TokenIssuer for HttpIdpClient {
    async fn issue(&self, credentials: &ClientCredentials) -> Result<IssuedToken, IdpError> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        if let Some(scope) = credentials.scope.as_deref().filter(|s| !s.is_empty()) {
            form.push(("scope", scope));
        }

        debug!(client_id = %credentials.client_id, url = %self.token_url, "Requesting token from IDP");

        let response = self.http.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(IdpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(IdpError::Decode)
    }
}

/// Issues `fake-token-<client_id>-<unix secs>` after a short delay.
#[derive(Debug, Clone)]
pub struct SimulatedIssuer {
    latency: Duration,
}

impl SimulatedIssuer {
    pub fn new() -> Self {
        Self::with_latency(SIMULATED_LATENCY)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenIssuer for SimulatedIssuer {
    async fn issue(&self, credentials: &ClientCredentials) -> Result<IssuedToken, IdpError> {
        tokio::time::sleep(self.latency).await;
        Ok(IssuedToken {
            access_token: format!(
                "fake-token-{}-{}",
                credentials.client_id,
                Utc::now().timestamp()
            ),
            token_type: "Bearer".to_string(),
            expires_in: SIMULATED_EXPIRES_IN,
            scope: credentials.scope.clone(),
        })
    }
}

/// The issuer a worker runs with, chosen at startup.
#[derive(Debug, Clone)]
pub enum IdpIssuer {
    Http(HttpIdpClient),
    Simulated(SimulatedIssuer),
}

impl IdpIssuer {
    pub fn from_config(config: &IdpConfig) -> Result<Self, IdpError> {
        if config.simulate {
            info!("Using simulated IDP issuer");
            return Ok(Self::Simulated(SimulatedIssuer::new()));
        }
        let client = HttpIdpClient::new(config)?;
        info!(url = %client.token_url(), "Using IDP token endpoint");
        Ok(Self::Http(client))
    }
}

impl TokenIssuer for IdpIssuer {
    async fn issue(&self, credentials: &ClientCredentials) -> Result<IssuedToken, IdpError> {
        match self {
            Self::Http(client) => client.issue(credentials).await,
            Self::Simulated(issuer) => issuer.issue(credentials).await,
        }
    }
}
