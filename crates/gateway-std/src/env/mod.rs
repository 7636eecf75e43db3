//! Environment variable access.
//!
//! ```
//! use gateway_std::env::{ReadEnv, SystemEnv};
//!
//! fn nats_url<E: ReadEnv>(env: &E) -> String {
//!     env.var("NATS_URL")
//!         .unwrap_or_else(|_| "nats://localhost:4222".to_string())
//! }
//!
//! let url = nats_url(&SystemEnv);
//! ```

mod in_memory;
mod system;

use std::env::VarError;

#[cfg(any(test, feature = "test-support"))]
pub use in_memory::InMemoryEnv;
pub use system::SystemEnv;

pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, VarError>;

    /// Parses `key`, falling back to `default` when unset or unparsable.
    fn parse_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.var(key)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}
