use std::path::PathBuf;
use std::time::Duration;

use gateway_std::env::ReadEnv;

const ENV_NATS_URL: &str = "NATS_URL";
const ENV_NATS_CREDS: &str = "NATS_CREDS";
const ENV_NATS_USER: &str = "NATS_USER";
const ENV_NATS_PASS: &str = "NATS_PASS";
const ENV_NATS_TOKEN: &str = "NATS_TOKEN";
const ENV_NATS_MAX_RECONNECTS: &str = "NATS_MAX_RECONNECTS";

const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
const DEFAULT_MAX_RECONNECTS: usize = 10;

/// NATS authentication method.
///
/// Resolved from the environment in priority order:
/// 1. Credentials file (`NATS_CREDS`)
/// 2. User/Password (`NATS_USER` + `NATS_PASS`)
/// 3. Token (`NATS_TOKEN`)
/// 4. No auth
#[derive(Clone)]
pub enum NatsAuth {
    Credentials(PathBuf),
    UserPassword { user: String, password: String },
    Token(String),
    None,
}

impl NatsAuth {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Credentials(_) => "credentials file",
            Self::UserPassword { .. } => "user/password",
            Self::Token(_) => "token",
            Self::None => "none",
        }
    }
}

// Secrets stay out of `{:?}` output so configs can be logged as-is.
impl std::fmt::Debug for NatsAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credentials(path) => f.debug_tuple("Credentials").field(path).finish(),
            Self::UserPassword { user, .. } => f
                .debug_struct("UserPassword")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
            Self::None => f.write_str("None"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NatsConfig {
    pub servers: Vec<String>,
    pub auth: NatsAuth,
    /// Name reported to the server (visible in `nats server report connections`).
    pub client_name: Option<String>,
    /// `None` retries forever.
    pub max_reconnects: Option<usize>,
    /// Transport-level cap on request/reply round trips. `None` leaves the
    /// deadline entirely to the caller.
    pub request_timeout: Option<Duration>,
}

impl NatsConfig {
    pub fn new(servers: Vec<String>, auth: NatsAuth) -> Self {
        Self {
            servers,
            auth,
            client_name: None,
            max_reconnects: Some(DEFAULT_MAX_RECONNECTS),
            request_timeout: None,
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(vec![url.into()], NatsAuth::None)
    }

    /// Build config from environment variables.
    ///
    /// - `NATS_URL`: comma-separated server list (default: `nats://localhost:4222`)
    /// - Auth via `NATS_CREDS` > `NATS_USER`+`NATS_PASS` > `NATS_TOKEN` > none
    /// - `NATS_MAX_RECONNECTS`: reconnect attempts before giving up (default: 10)
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let mut config = Self::new(servers_from_env(env), auth_from_env(env));
        config.max_reconnects = Some(env.parse_or(ENV_NATS_MAX_RECONNECTS, DEFAULT_MAX_RECONNECTS));
        config
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

fn servers_from_env<E: ReadEnv>(env: &E) -> Vec<String> {
    let raw = env
        .var(ENV_NATS_URL)
        .unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());
    let servers: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if servers.is_empty() {
        vec![DEFAULT_NATS_URL.to_string()]
    } else {
        servers
    }
}

fn auth_from_env<E: ReadEnv>(env: &E) -> NatsAuth {
    if let Ok(creds_path) = env.var(ENV_NATS_CREDS) {
        return NatsAuth::Credentials(PathBuf::from(creds_path));
    }
    if let (Ok(user), Ok(password)) = (env.var(ENV_NATS_USER), env.var(ENV_NATS_PASS)) {
        return NatsAuth::UserPassword { user, password };
    }
    if let Ok(token) = env.var(ENV_NATS_TOKEN) {
        return NatsAuth::Token(token);
    }
    NatsAuth::None
}
