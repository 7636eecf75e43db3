use std::env::{self, VarError};

use super::ReadEnv;

/// Delegates to the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, VarError> {
        env::var(key)
    }
}
