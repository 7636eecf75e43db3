//! Clocks for expiry bookkeeping.
//!
//! [`GetNow::Instant`] supports `instant + ttl` and ordering, which is all an
//! expiring store needs: stamp `now + ttl` on write, compare `now < deadline`
//! on read. [`GetNow::deadline`] does the stamping without overflowing on
//! very long TTLs.
//!
//! ```
//! use gateway_std::time::{GetNow, SystemClock};
//! use std::time::Duration;
//!
//! fn is_live<C: GetNow>(clock: &C, deadline: C::Instant) -> bool {
//!     clock.now() < deadline
//! }
//!
//! let clock = SystemClock;
//! let deadline = clock.now() + Duration::from_secs(30);
//! assert!(is_live(&clock, deadline));
//! assert!(is_live(&clock, clock.deadline(Duration::MAX)));
//! ```

mod mock;
mod system;

use std::fmt::Debug;
use std::ops::Add;
use std::time::Duration;

#[cfg(any(test, feature = "test-support"))]
pub use mock::{MockClock, MockInstant};
pub use system::SystemClock;

pub trait GetNow: Send + Sync + 'static {
    type Instant: Copy + Ord + Debug + Add<Duration, Output = Self::Instant> + Send + Sync;

    fn now(&self) -> Self::Instant;

    /// `now() + after`, saturating at a far-future instant instead of
    /// overflowing.
    fn deadline(&self, after: Duration) -> Self::Instant;
}
