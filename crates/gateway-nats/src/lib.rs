//! # gateway-nats
//!
//! NATS infrastructure shared by the gateway and the token worker:
//!
//! - Connection settings and authentication resolved from the environment
//! - Connecting with bounded, backed-off reconnection and event logging
//! - Per-operation client traits so request/reply code can run against mocks
//! - OpenTelemetry trace context propagation through NATS headers
//! - [`MockNatsClient`] for tests (with the `test-support` feature)
//!
//! ```rust,no_run
//! use gateway_nats::{NatsConfig, connect};
//! use gateway_std::env::SystemEnv;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = NatsConfig::from_env(&SystemEnv);
//!     let client = connect(&config).await.expect("Failed to connect");
//! }
//! ```

pub mod auth;
pub mod client;
pub mod connect;
pub mod messaging;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use auth::{NatsAuth, NatsConfig};
pub use client::{PublishClient, RequestClient, RequestFailure};
pub use connect::{ConnectError, connect};
pub use messaging::{headers_with_trace_context, inject_trace_context};

#[cfg(any(test, feature = "test-support"))]
pub use mocks::{MockError, MockNatsClient};
