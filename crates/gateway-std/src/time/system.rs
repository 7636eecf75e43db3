use std::time::Duration;

use super::GetNow;

/// Stand-in for "never" when a deadline would overflow.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Reads `tokio::time::Instant`, so a paused tokio runtime
/// (`#[tokio::test(start_paused = true)]`) also freezes expiry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl GetNow for SystemClock {
    type Instant = tokio::time::Instant;

    #[inline]
    fn now(&self) -> tokio::time::Instant {
        tokio::time::Instant::now()
    }

    fn deadline(&self, after: Duration) -> tokio::time::Instant {
        let now = self.now();
        now.checked_add(after)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now)
    }
}
