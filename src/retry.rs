//! Retry-with-backoff for operations that hit transient connectivity errors.
//!
//! The combinator is independent of what it retries: callers pass the
//! classification function that decides which errors are worth repeating.
//! The index writer applies it to the exists-check, index creation, and
//! bulk writes; the source applies it to locked-database reads.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

/// Backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    /// Delay before the first retry.
    #[serde(with = "millis")]
    pub initial: Duration,
    /// Upper bound for any single delay.
    #[serde(with = "millis")]
    pub max: Duration,
    /// Multiplicative factor for backoff growth.
    pub factor: u32,
    /// Maximum number of attempts, inclusive of the first one.
    pub max_attempts: usize,
}

impl Backoff {
    /// Compute the next delay given the current delay.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next = current.saturating_mul(self.factor);
        if next > self.max { self.max } else { next }
    }

    /// A policy that never sleeps, for tests.
    #[must_use]
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1,
            max_attempts,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2,
            max_attempts: 10,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// attempt budget is spent. The last error is returned on exhaustion.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    op_name: &str,
    backoff: &Backoff,
    is_transient: C,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut delay = backoff.initial;
    let mut attempt = 1usize;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt < backoff.max_attempts.max(1) => {
                tracing::warn!(
                    op = op_name,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient failure, retrying"
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                delay = backoff.next_delay(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    #[test]
    fn test_next_delay_is_capped() {
        let backoff = Backoff::default();
        let mut delay = backoff.initial;
        for _ in 0..20 {
            delay = backoff.next_delay(delay);
        }
        assert_eq!(delay, backoff.max);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = Cell::new(0);
        let result = retry_with_backoff("probe", &Backoff::immediate(5), Error::is_transient, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(Error::SinkUnavailable("connection refused".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), Error> =
            retry_with_backoff("probe", &Backoff::immediate(5), Error::is_transient, || {
                calls.set(calls.get() + 1);
                async { Err(Error::Sink("400 bad request".into())) }
            })
            .await;

        assert!(matches!(result, Err(Error::Sink(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_attempt_budget_is_bounded() {
        let calls = Cell::new(0);
        let result: Result<(), Error> =
            retry_with_backoff("probe", &Backoff::immediate(4), Error::is_transient, || {
                calls.set(calls.get() + 1);
                async { Err(Error::SinkUnavailable("timeout".into())) }
            })
            .await;

        assert!(matches!(result, Err(Error::SinkUnavailable(_))));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_backoff_deserializes_millis() {
        let backoff: Backoff =
            serde_json::from_str(r#"{"initial": 250, "max": 5000, "max_attempts": 3}"#).unwrap();
        assert_eq!(backoff.initial, Duration::from_millis(250));
        assert_eq!(backoff.max, Duration::from_secs(5));
        assert_eq!(backoff.factor, 2);
        assert_eq!(backoff.max_attempts, 3);
    }
}
