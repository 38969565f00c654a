use std::time::Duration;

pub const INITIAL_BACKOFF: Duration = Duration::from_secs(5);
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Reconnect delay: 5s, doubling per consecutive failure, capped at 30s.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            next: INITIAL_BACKOFF,
            failures: 0,
        }
    }

    /// Record a failed attempt and return how long to wait before the next one.
    pub fn fail(&mut self) -> Duration {
        let delay = self.next;
        self.failures += 1;
        self.next = (self.next * 2).min(MAX_BACKOFF);
        delay
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
