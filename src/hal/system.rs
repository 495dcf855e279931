//! Monotonic clock backed by `std::time::Instant`.

use std::time::Instant;

use crate::traits::Clock;

/// Milliseconds since the clock was created.
///
/// # Example
///
/// ```rust
/// use rs_sinric::hal::SystemClock;
/// use rs_sinric::traits::Clock;
///
/// let clock = SystemClock::new();
/// let a = clock.now_ms();
/// assert!(clock.now_ms() >= a);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
