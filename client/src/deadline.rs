//! Monotonic deadline tracking.

use std::time::{Duration, Instant};

/// Stand-in for "no deadline". Unbounded deadlines break some transport
/// stacks, so infinity is encoded as ten days ahead.
pub const INFINITE_TIMEOUT: Duration = Duration::from_secs(10 * 24 * 60 * 60);

/// An absolute monotonic instant a call must not outlive. Immutable once
/// created; the system clock is never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now. A zero timeout means practically
    /// unbounded.
    pub fn after(timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            INFINITE_TIMEOUT
        } else {
            timeout
        };
        Self {
            at: Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn has_passed(&self) -> bool {
        self.remaining().is_zero()
    }

    /// The absolute monotonic value, for transport integration.
    pub fn instant(&self) -> Instant {
        self.at
    }
}
