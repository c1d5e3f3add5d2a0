//! Reconnection configuration and exponential backoff.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Maximum number of reconnection attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Delay slept before the given attempt (1-based): the base delay
    /// doubled once per earlier attempt, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1);
        1u32.checked_shl(doublings)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Check if another attempt is allowed after `attempt` attempts.
    #[must_use]
    pub const fn should_reconnect(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Mutable backoff state for one session.
///
/// Counts attempts since the last successful connect; the delay before each
/// attempt comes from [`ReconnectConfig::delay_for_attempt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a fresh policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// The configuration this policy was built from.
    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Attempts made since the last successful connect.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Delay that will precede the next attempt.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.config.delay_for_attempt(self.attempt_count.saturating_add(1))
    }

    /// Whether the attempt budget has room left.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        self.config.should_reconnect(self.attempt_count)
    }

    /// Claim the next attempt.
    ///
    /// Returns the attempt number and the delay to sleep before it, then
    /// advances the backoff. Returns `None` once the budget is spent.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if !self.can_retry() {
            return None;
        }

        self.attempt_count += 1;
        Some((self.attempt_count, self.config.delay_for_attempt(self.attempt_count)))
    }

    /// Forget earlier attempts after a successful connect.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
