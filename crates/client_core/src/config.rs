use std::time::Duration;

const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RECONNECT_INITIAL: Duration = Duration::from_millis(500);
const DEFAULT_RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Exponential reconnect schedule for a lost subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: u32,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: DEFAULT_RECONNECT_INITIAL,
            multiplier: 2,
            max: DEFAULT_RECONNECT_MAX,
        }
    }
}

impl BackoffPolicy {
    /// Delay before reconnect `attempt` (1-based): `initial * multiplier^(attempt-1)`, capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Upper bound on a single create/update/delete round trip.
    pub mutation_timeout: Duration,
    pub reconnect: BackoffPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            mutation_timeout: DEFAULT_MUTATION_TIMEOUT,
            reconnect: BackoffPolicy::default(),
        }
    }
}
