//! Small seams over `std` so the gateway can be configured and timed in tests.
//!
//! | Concern | Trait | Production | Test |
//! |---------|-------|------------|------|
//! | Env vars | [`ReadEnv`] | [`SystemEnv`] | [`InMemoryEnv`]* |
//! | Time | [`GetNow`] | [`SystemClock`] | [`MockClock`]* |
//!
//! *Available with `#[cfg(test)]` or the `"test-support"` feature.
//!
//! All types are `Send + Sync`, so they can live inside axum state and be
//! shared with spawned tokio tasks.

pub mod env;
pub mod time;

pub use env::{ReadEnv, SystemEnv};
pub use time::{GetNow, SystemClock};
