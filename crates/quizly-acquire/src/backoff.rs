use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff with jitter for transient provider errors.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_millis(500),
            cap: Duration::from_secs(8),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based: the delay after the
    /// first failure is `delay(1)`). Exponential doubling, capped, with
    /// ±50% jitter so concurrent pipelines don't retry in lockstep.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base.saturating_mul(1u32 << (attempt - 1).min(16));
        let capped = exp.min(self.cap);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        capped.mul_f64(jitter).min(self.cap)
    }

    /// Delay used when the provider rate-limited us: one extra doubling
    /// over the normal schedule.
    pub fn rate_limited_delay(&self, attempt: u32) -> Duration {
        self.delay(attempt.saturating_add(1))
    }

    pub fn attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
