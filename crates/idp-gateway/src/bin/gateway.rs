//! HTTP token gateway binary.
//!
//! Listens on `GATEWAY_PORT` (default 8080), serves tokens from its cache and
//! asks token workers over NATS on a miss.
//!
//! # Environment variables
//!
//! | Variable                            | Default          | Description                        |
//! |-------------------------------------|------------------|------------------------------------|
//! | `NATS_URL`                          | localhost:4222   | NATS server address(es)            |
//! | `NATS_CREDS` / `NATS_USER`+`NATS_PASS` / `NATS_TOKEN` | none | NATS authentication     |
//! | `GATEWAY_PORT`                      | `8080`           | TCP port to listen on              |
//! | `GATEWAY_REQUEST_TIMEOUT_SECS`      | `5`              | Seconds to wait for a worker reply |
//! | `GATEWAY_CACHE_TTL_SECS`            | `3300`           | Seconds a token stays cached       |
//! | `GATEWAY_CACHE_SWEEP_INTERVAL_SECS` | `60`             | Seconds between cache sweeps       |
//! | `TOKEN_SUBJECT`                     | `token.request`  | Subject token requests go to       |
//! | `RUST_LOG`                          | `info`           | Log filter (tracing-subscriber)    |

use std::sync::Arc;

use anyhow::Context;
use gateway_nats::connect;
use gateway_std::SystemEnv;
use idp_gateway::bridge::TokenBridge;
use idp_gateway::config::GatewayConfig;
use idp_gateway::gateway::{GatewayState, router};
use idp_gateway::shutdown::shutdown_signal;
use token_cache::{TokenCache, spawn_sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env(&SystemEnv);

    let nats = connect(&config.nats)
        .await
        .context("Failed to connect to NATS")?;

    let cache = Arc::new(TokenCache::new());
    let sweeper = spawn_sweeper(Arc::clone(&cache), config.sweep_interval);

    let state = GatewayState {
        cache,
        bridge: TokenBridge::new(nats.clone(), config.token_subject.clone()),
        request_timeout: config.request_timeout,
        cache_ttl: config.cache_ttl,
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    tracing::info!(
        port = config.port,
        subject = %config.token_subject,
        request_timeout_secs = config.request_timeout.as_secs(),
        cache_ttl_secs = config.cache_ttl.as_secs(),
        "Token gateway listening"
    );

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tracing::info!("Shutting down");
    sweeper.shutdown().await;
    if let Err(e) = nats.drain().await {
        tracing::warn!(error = %e, "Failed to drain NATS connection");
    }

    served.context("Server error")
}
