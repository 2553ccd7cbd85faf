use std::time::Duration;

/// Lower bound for any wait, so polling never spins.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Exponential wait between status polls, bounded by `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub min: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(200),
            max: Duration::from_secs(10 * 60),
            factor: 2,
        }
    }
}

impl BackoffPolicy {
    #[must_use]
    pub const fn new(min: Duration, max: Duration, factor: u32) -> Self {
        Self { min, max, factor }
    }

    const fn floor(&self) -> Duration {
        if self.min.is_zero() { MIN_DELAY } else { self.min }
    }

    /// Fresh backoff state for one statement wait.
    #[must_use]
    pub const fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            current: self.floor(),
        }
    }

    /// Wait before poll number `attempt + 1`, counting from zero.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.floor().min(self.max).max(MIN_DELAY);
        for _ in 0..attempt {
            if delay >= self.max || self.factor <= 1 {
                break;
            }
            delay = delay.saturating_mul(self.factor).min(self.max);
        }
        delay
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }

    /// Returns the wait to apply now and advances the state.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.policy.max).max(MIN_DELAY);
        self.current = delay
            .saturating_mul(self.policy.factor.max(1))
            .min(self.policy.max);
        delay
    }

    pub const fn reset(&mut self) {
        self.current = self.policy.floor();
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.min, Duration::from_millis(200));
        assert_eq!(policy.max, Duration::from_secs(600));
        assert_eq!(policy.factor, 2);
    }

    #[test]
    fn test_doubles_until_ceiling() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), Duration::from_millis(700), 2);
        let delays: Vec<u128> = policy.start().take(6).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 700, 700, 700]);
        for (attempt, delay) in (0u32..).zip(policy.start().take(6)) {
            assert_eq!(policy.delay_for(attempt), delay);
        }
    }

    #[test]
    fn test_reset() {
        let mut backoff = BackoffPolicy::default().start();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.current(), Duration::from_millis(800));
        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(200));
    }

    #[test]
    fn test_degenerate_policy_still_waits() {
        let zero = BackoffPolicy::new(Duration::ZERO, Duration::from_millis(4), 2);
        assert_eq!(zero.delay_for(u32::MAX), Duration::from_millis(4));
        let delays: Vec<u128> = zero.start().take(4).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![1, 2, 4, 4]);

        let flat = BackoffPolicy::new(Duration::from_millis(5), Duration::from_secs(1), 0);
        assert!(flat.start().take(3).all(|d| d == Duration::from_millis(5)));
        assert_eq!(flat.delay_for(3), Duration::from_millis(5));

        let closed = BackoffPolicy::new(Duration::ZERO, Duration::ZERO, 2);
        assert_eq!(closed.delay_for(7), MIN_DELAY);
        assert_eq!(closed.start().next(), Some(MIN_DELAY));
    }

    #[test]
    fn test_never_overflows() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), policy.max);
    }
}
