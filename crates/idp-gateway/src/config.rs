//! Configuration for the gateway and the token worker, read from the environment.

use std::time::Duration;

use gateway_nats::NatsConfig;
use gateway_std::env::ReadEnv;

use crate::idp::IdpConfig;
use crate::subjects::{DEFAULT_QUEUE_GROUP, DEFAULT_TOKEN_SUBJECT, worker_client_name};

const ENV_GATEWAY_PORT: &str = "GATEWAY_PORT";
const ENV_REQUEST_TIMEOUT_SECS: &str = "GATEWAY_REQUEST_TIMEOUT_SECS";
const ENV_CACHE_TTL_SECS: &str = "GATEWAY_CACHE_TTL_SECS";
const ENV_CACHE_SWEEP_INTERVAL_SECS: &str = "GATEWAY_CACHE_SWEEP_INTERVAL_SECS";
const ENV_TOKEN_SUBJECT: &str = "TOKEN_SUBJECT";
const ENV_QUEUE_GROUP: &str = "WORKER_QUEUE_GROUP";
const ENV_NAME_SUFFIX_KEYS: [&str; 3] = ["WORKER_NAME_SUFFIX", "POD_NAME", "HOSTNAME"];

const DEFAULT_GATEWAY_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(55 * 60);
const DEFAULT_CACHE_SWEEP_INTERVAL: Duration = token_cache::DEFAULT_SWEEP_INTERVAL;
const GATEWAY_CLIENT_NAME: &str = "IDP Gateway";
/// Longer durations would overflow instant arithmetic.
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Whole seconds from `key`; zero or unparsable values give `default`.
pub(crate) fn secs_or<E: ReadEnv>(env: &E, key: &str, default: Duration) -> Duration {
    match env.parse_or(key, default.as_secs()) {
        0 => default,
        secs => Duration::from_secs(secs.min(MAX_DURATION_SECS)),
    }
}

fn subject_from_env<E: ReadEnv>(env: &E) -> String {
    env.var(ENV_TOKEN_SUBJECT)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_TOKEN_SUBJECT.to_string())
}

/// Settings for the HTTP gateway binary.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub nats: NatsConfig,
    pub port: u16,
    /// Upper bound on waiting for a worker reply.
    pub request_timeout: Duration,
    /// How long a freshly issued token is served from cache.
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,
    pub token_subject: String,
}

impl GatewayConfig {
    /// Zero or unparsable durations fall back to their defaults.
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        Self {
            nats: NatsConfig::from_env(env).with_client_name(GATEWAY_CLIENT_NAME),
            port: env.parse_or(ENV_GATEWAY_PORT, DEFAULT_GATEWAY_PORT),
            request_timeout: secs_or(env, ENV_REQUEST_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT),
            cache_ttl: secs_or(env, ENV_CACHE_TTL_SECS, DEFAULT_CACHE_TTL),
            sweep_interval: secs_or(
                env,
                ENV_CACHE_SWEEP_INTERVAL_SECS,
                DEFAULT_CACHE_SWEEP_INTERVAL,
            ),
            token_subject: subject_from_env(env),
        }
    }
}

/// Settings for the token worker binary.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub nats: NatsConfig,
    pub token_subject: String,
    pub queue_group: String,
    pub idp: IdpConfig,
}

impl WorkerConfig {
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let suffix = ENV_NAME_SUFFIX_KEYS
            .iter()
            .find_map(|key| env.var(key).ok().filter(|v| !v.trim().is_empty()));

        Self {
            nats: NatsConfig::from_env(env).with_client_name(worker_client_name(suffix.as_deref())),
            token_subject: subject_from_env(env),
            queue_group: env
                .var(ENV_QUEUE_GROUP)
                .ok()
                .filter(|g| !g.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_QUEUE_GROUP.to_string()),
            idp: IdpConfig::from_env(env),
        }
    }
}
