use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use gateway_std::time::{GetNow, SystemClock};

struct CacheEntry<I> {
    value: String,
    expires_at: I,
}

/// Thread-safe expiring cache keyed by client id.
///
/// Readers share the lock, writers take it exclusively, and an entry is
/// replaced as a whole, so a reader sees either the old or the new
/// `(value, expiry)` pair, never a mix. None of the operations can fail: a
/// lock poisoned by a panicking writer is recovered because every write
/// leaves the map consistent.
pub struct TokenCache<C: GetNow = SystemClock> {
    clock: C,
    entries: RwLock<HashMap<String, CacheEntry<C::Instant>>>,
}

impl TokenCache<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for TokenCache<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: GetNow> TokenCache<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the value for `key` while `now < expires_at`.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        self.read()
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// Inserts or replaces the entry for `key`, expiring `ttl` from now. A
    /// TTL too long to represent keeps the entry until it is replaced or
    /// removed.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry {
            value: value.into(),
            expires_at: self.clock.deadline(ttl),
        };
        self.write().insert(key.into(), entry);
    }

    /// Returns whether an entry (live or expired) was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<C::Instant>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<C::Instant>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
