#[cfg(any(test, feature = "test-support"))]
use std::ops::Add;
#[cfg(any(test, feature = "test-support"))]
use std::sync::{Arc, Mutex};
#[cfg(any(test, feature = "test-support"))]
use std::time::Duration;

#[cfg(any(test, feature = "test-support"))]
use super::GetNow;

/// Manually driven clock. Time only moves on [`advance`](MockClock::advance)
/// or [`set`](MockClock::set); clones share the same timeline.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    current: Arc<Mutex<Duration>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.current.lock().unwrap() += by;
    }

    pub fn set(&self, at: Duration) {
        *self.current.lock().unwrap() = at;
    }
}

/// Offset from the mock clock's epoch.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(pub Duration);

#[cfg(any(test, feature = "test-support"))]
impl Add<Duration> for MockInstant {
    type Output = MockInstant;

    fn add(self, rhs: Duration) -> MockInstant {
        MockInstant(self.0.saturating_add(rhs))
    }
}

#[cfg(any(test, feature = "test-support"))]
impl GetNow for MockClock {
    type Instant = MockInstant;

    fn now(&self) -> MockInstant {
        MockInstant(*self.current.lock().unwrap())
    }

    fn deadline(&self, after: Duration) -> MockInstant {
        self.now() + after
    }
}
