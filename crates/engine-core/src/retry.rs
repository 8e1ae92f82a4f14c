use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay schedule between write attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backoff", rename_all = "snake_case")]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed {
        #[serde(with = "millis", rename = "delay_ms")]
        delay: Duration,
    },
    /// `base * 2^attempt`, capped at `max`.
    Exponential {
        #[serde(with = "millis", rename = "delay_ms")]
        base: Duration,
        #[serde(with = "millis", rename = "max_delay_ms")]
        max: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: usize,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_database()
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn fixed(max_retries: usize, delay: Duration) -> Self {
        Self::new(max_retries, Backoff::Fixed { delay })
    }

    pub fn exponential(max_retries: usize, base: Duration, max: Duration) -> Self {
        let max = if max.is_zero() { base } else { max };
        Self::new(max_retries, Backoff::Exponential { base, max })
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Preset tuned for database/network calls.
    pub fn for_database() -> Self {
        Self::exponential(3, Duration::from_millis(250), Duration::from_secs(5))
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Delay to wait after the failed attempt number `attempt` (zero-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential { base, max } => {
                if base.is_zero() {
                    return Duration::ZERO;
                }
                let factor = 1u128 << attempt.min(6);
                let delay_ms = base.as_millis().saturating_mul(factor);
                let capped = delay_ms.min(max.as_millis());
                Duration::from_millis(capped as u64)
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
