//! Time source for the blocking drain loop

use embassy_time::{Duration, Instant};

/// Default polling step of [`SystemClock`].
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_micros(50);

/// Time source and idle strategy used while waiting for hardware.
///
/// Platforms with completion interrupts may sleep until the next
/// interrupt; polled platforms spin for a short step.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Wait for hardware progress, returning no later than `deadline`.
    fn idle_until(&mut self, deadline: Instant);
}

/// Clock backed by the `embassy-time` driver, idling with short busy waits
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    poll: Duration,
}

impl SystemClock {
    pub const fn new() -> Self {
        Self::with_poll_interval(DEFAULT_IDLE_POLL)
    }

    pub const fn with_poll_interval(poll: Duration) -> Self {
        Self { poll }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn idle_until(&mut self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.as_ticks() == 0 {
            return;
        }
        embassy_time::block_for(remaining.min(self.poll));
    }
}
