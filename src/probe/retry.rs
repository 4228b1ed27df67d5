//! Pause between attempts.

use std::time::Duration;

use serde::Deserialize;

const TICK: Duration = Duration::from_secs(1);

/// How long to cool down after an attempt and when to give up.
///
/// The default is a fixed five second pause, repeated forever.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Same pause after every attempt.
    Fixed {
        delay_secs: u64,
        #[serde(default)]
        max_attempts: Option<u64>,
    },
    /// Pause grows by `factor` after each attempt, capped at `max_secs`.
    Exponential {
        initial_secs: u64,
        max_secs: u64,
        factor: u32,
        #[serde(default)]
        max_attempts: Option<u64>,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed {
            delay_secs: 5,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Pause after the `attempt`-th completed attempt (1-based).
    pub fn delay(&self, attempt: u64) -> Duration {
        match *self {
            RetryPolicy::Fixed { delay_secs, .. } => Duration::from_secs(delay_secs),
            RetryPolicy::Exponential {
                initial_secs,
                max_secs,
                factor,
                ..
            } => {
                let exp = attempt.saturating_sub(1).min(u32::MAX as u64) as u32;
                let growth = (factor as u64).saturating_pow(exp);
                Duration::from_secs(initial_secs.saturating_mul(growth).min(max_secs))
            }
        }
    }

    pub fn max_attempts(&self) -> Option<u64> {
        match *self {
            RetryPolicy::Fixed { max_attempts, .. } => max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => max_attempts,
        }
    }

    /// `true` once `completed` attempts exhaust the policy.
    pub fn exhausted(&self, completed: u64) -> bool {
        self.max_attempts().is_some_and(|max| completed >= max)
    }
}

/// Sleep for `delay`, logging the remaining whole seconds once per second.
pub async fn cooldown(delay: Duration) {
    let mut remaining = delay;
    while !remaining.is_zero() {
        tracing::info!(remaining_secs = remaining.as_secs_f32().ceil() as u64, "Cooling down...");
        let tick = remaining.min(TICK);
        tokio::time::sleep(tick).await;
        remaining -= tick;
    }
    tracing::info!("Starting again!");
}
