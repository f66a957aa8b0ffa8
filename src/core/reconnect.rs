use std::time::Duration;

use super::types::{ReconnectPlan, WsReconnectStrategy};

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Bounded exponential backoff: attempt `n` waits `base * 2^(n-1)`.
///
/// The counter is the session's reconnect counter: it is reset on every successful open and
/// incremented once per close-triggered attempt, never past `max_attempts`.
#[derive(Clone, Debug)]
pub struct ExponentialBackoffReconnect {
    base: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ExponentialBackoffReconnect {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << shift)
    }
}

impl Default for ExponentialBackoffReconnect {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_BASE_DELAY, DEFAULT_MAX_RECONNECT_ATTEMPTS)
    }
}

impl WsReconnectStrategy for ExponentialBackoffReconnect {
    fn plan_next(&mut self) -> ReconnectPlan {
        if self.attempts >= self.max_attempts {
            return ReconnectPlan::Exhausted {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        ReconnectPlan::Retry {
            attempt: self.attempts,
            delay: self.delay_for(self.attempts),
        }
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }
}
