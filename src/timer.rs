use std::time::{Duration, Instant};

/// Fixed-period deadline tracker for the native redraw loop
///
/// The event loop sleeps until [`Ticker::deadline`] and then calls
/// [`Ticker::poll`]. Missed periods are skipped rather than replayed, so a
/// stalled loop produces one tick instead of a burst.
#[derive(Clone, Copy, Debug)]
pub struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next: now + period,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.next
    }

    /// Returns `true` once per elapsed period
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.period;
        if self.next <= now {
            // Land on the first period boundary strictly after `now`
            let period = self.period.as_nanos().max(1);
            let into_period = (now - self.next).as_nanos() % period;
            let remaining = u64::try_from(period - into_period).unwrap_or(u64::MAX);
            self.next = now + Duration::from_nanos(remaining);
        }
        true
    }
}
