//! HTTP token gateway in front of an OAuth2 identity provider.
//!
//! # Architecture
//!
//! ```text
//! Client → POST http://gateway:8080/token {"client_id","client_secret"}
//!               ↓
//!          [Gateway (axum)]
//!               ↓ validate body
//!               ↓ token cache hit → 200 {source: "cache"}
//!               ↓ miss: NATS request on "token.request", wait up to 5s
//!          [Token Worker (queue group "token-workers")]
//!               ↓ client-credentials exchange with the IDP
//!               ↓ reply TokenResponse on the request inbox
//!          [Gateway caches the token for 55 min, 200 {source: "idp"}]
//! ```

pub mod bridge;
pub mod config;
pub mod gateway;
pub mod idp;
pub mod messages;
pub mod shutdown;
pub mod subjects;
pub mod validator;
pub mod worker;
