//! Token worker binary.
//!
//! Joins the worker queue group on the token subject, exchanges client
//! credentials with the IDP and replies to the gateway.
//!
//! # Environment variables
//!
//! | Variable             | Default                                          | Description                      |
//! |----------------------|--------------------------------------------------|----------------------------------|
//! | `NATS_URL`           | localhost:4222                                   | NATS server address(es)          |
//! | `TOKEN_SUBJECT`      | `token.request`                                  | Subject to consume               |
//! | `WORKER_QUEUE_GROUP` | `token-workers`                                  | Queue group to join              |
//! | `WORKER_NAME_SUFFIX` | `POD_NAME`, then `HOSTNAME`                      | Suffix of the NATS client name   |
//! | `IDP_URL`            | `https://idp.example.com`                        | IDP base URL                     |
//! | `IDP_TOKEN_PATH`     | `/realms/phoenix/protocol/openid-connect/token`  | Token endpoint path              |
//! | `IDP_SCOPE`          | `openid profile`                                 | Scope requested for every client |
//! | `IDP_TIMEOUT_SECS`   | `10`                                             | IDP HTTP timeout                 |
//! | `IDP_SIMULATE`       | `false`                                          | Issue fake tokens instead        |
//! | `RUST_LOG`           | `info`                                           | Log filter (tracing-subscriber)  |

use anyhow::Context;
use gateway_nats::connect;
use gateway_std::SystemEnv;
use idp_gateway::config::WorkerConfig;
use idp_gateway::idp::IdpIssuer;
use idp_gateway::shutdown::shutdown_signal;
use idp_gateway::worker::TokenWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = WorkerConfig::from_env(&SystemEnv);
    let issuer = IdpIssuer::from_config(&config.idp).context("Failed to build IDP client")?;

    let nats = connect(&config.nats)
        .await
        .context("Failed to connect to NATS")?;

    let subscriber = nats
        .queue_subscribe(config.token_subject.clone(), config.queue_group.clone())
        .await
        .with_context(|| format!("Failed to subscribe to {}", config.token_subject))?;

    tracing::info!(
        subject = %config.token_subject,
        queue_group = %config.queue_group,
        "Token worker subscribed"
    );

    let worker = TokenWorker::new(issuer, nats.clone(), config.idp.scope.clone());
    let mut running = tokio::spawn(worker.run(subscriber));

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutting down, draining subscription");
            if let Err(e) = nats.drain().await {
                tracing::warn!(error = %e, "Failed to drain NATS connection");
            }
            running.await.context("Worker task failed")?;
        }
        finished = &mut running => {
            finished.context("Worker task failed")?;
            tracing::warn!("Subscription closed");
        }
    }

    Ok(())
}
