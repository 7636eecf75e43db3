//! # token-cache
//!
//! In-memory `client id → access token` store with per-entry expiry.
//!
//! - Reads check expiry lazily, so a stale token is never returned even if
//!   the sweeper has not run yet.
//! - [`spawn_sweeper`] prunes expired entries on a fixed interval so keys that
//!   are never queried again do not accumulate. It stops when its
//!   [`SweeperHandle`] is shut down or dropped.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use token_cache::{TokenCache, spawn_sweeper, DEFAULT_SWEEP_INTERVAL};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = Arc::new(TokenCache::new());
//!     let sweeper = spawn_sweeper(Arc::clone(&cache), DEFAULT_SWEEP_INTERVAL);
//!
//!     cache.set("client-1", "tok-abc", Duration::from_secs(55 * 60));
//!     assert_eq!(cache.get("client-1").as_deref(), Some("tok-abc"));
//!
//!     sweeper.shutdown().await;
//! }
//! ```

mod cache;
mod sweeper;

pub use cache::TokenCache;
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, SweeperHandle, spawn_sweeper};
