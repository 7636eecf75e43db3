use std::time::Duration;

use async_nats::{Client, ConnectOptions, Event};
use tracing::{info, instrument, warn};

use crate::auth::{NatsAuth, NatsConfig};

#[derive(Debug)]
pub enum ConnectError {
    InvalidCredentials(std::io::Error),
    ConnectionFailed {
        servers: Vec<String>,
        error: async_nats::ConnectError,
    },
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials(e) => {
                write!(f, "Failed to load credentials file: {}", e)
            }
            Self::ConnectionFailed { servers, error } => {
                write!(
                    f,
                    "Failed to connect to NATS servers {:?}: {}",
                    servers, error
                )
            }
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidCredentials(e) => Some(e),
            Self::ConnectionFailed { error, .. } => Some(error),
        }
    }
}

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

fn reconnect_delay(attempts: usize) -> Duration {
    let exponent = u32::try_from(attempts).unwrap_or(u32::MAX);
    let delay = Duration::from_secs(std::cmp::min(
        MAX_RECONNECT_DELAY.as_secs(),
        2u64.saturating_pow(exponent),
    ));
    info!(
        attempts,
        delay_secs = delay.as_secs(),
        "NATS reconnect delay"
    );
    delay
}

async fn handle_event(event: Event) {
    match event {
        Event::Connected => info!("NATS connected"),
        Event::Disconnected => warn!("NATS disconnected - will attempt reconnect"),
        Event::ServerError(err) => warn!(error = %err, "NATS server error"),
        Event::ClientError(err) => warn!(error = %err, "NATS client error"),
        Event::SlowConsumer(sid) => warn!(sid, "NATS slow consumer detected"),
        Event::LameDuckMode => warn!("NATS server entering lame duck mode"),
        Event::Closed => info!("NATS connection closed"),
        Event::Draining => info!("NATS connection draining"),
    }
}

fn apply_options(opts: ConnectOptions, config: &NatsConfig) -> ConnectOptions {
    let mut opts = opts
        .retry_on_initial_connect()
        .connection_timeout(CONNECTION_TIMEOUT)
        .max_reconnects(config.max_reconnects)
        .request_timeout(config.request_timeout)
        .reconnect_delay_callback(reconnect_delay)
        .event_callback(|event| async move { handle_event(event).await });
    if let Some(name) = &config.client_name {
        opts = opts.name(name.clone());
    }
    opts
}

/// Connect to NATS with bounded reconnection and event logging.
#[instrument(name = "nats.connect", skip(config), fields(servers = ?config.servers, auth = %config.auth.description()))]
pub async fn connect(config: &NatsConfig) -> Result<Client, ConnectError> {
    info!(
        servers = ?config.servers,
        auth = %config.auth.description(),
        client_name = ?config.client_name,
        "Connecting to NATS"
    );

    let base = match &config.auth {
        NatsAuth::Credentials(path) => {
            info!(path = %path.display(), "Using credentials file");
            match ConnectOptions::with_credentials_file(path.clone()).await {
                Ok(opts) => opts,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Failed to load credentials file");
                    return Err(ConnectError::InvalidCredentials(e));
                }
            }
        }
        NatsAuth::UserPassword { user, password } => {
            ConnectOptions::with_user_and_password(user.clone(), password.clone())
        }
        NatsAuth::Token(token) => ConnectOptions::with_token(token.clone()),
        NatsAuth::None => ConnectOptions::new(),
    };

    match apply_options(base, config).connect(&config.servers).await {
        Ok(client) => {
            info!(servers = ?config.servers, "Connected to NATS");
            Ok(client)
        }
        Err(e) => {
            warn!(
                error = %e,
                servers = ?config.servers,
                auth = %config.auth.description(),
                "Failed to connect to NATS"
            );
            Err(ConnectError::ConnectionFailed {
                servers: config.servers.clone(),
                error: e,
            })
        }
    }
}
