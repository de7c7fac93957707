//! Bounded retry for transient sub-operation failures

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::runtime::error::ProbeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "serde_duration")]
    pub delay: Duration,
    pub backoff: BackoffStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            backoff: BackoffStrategy::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            delay,
            backoff,
        }
    }

    /// A single attempt, no retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, BackoffStrategy::Fixed)
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffStrategy::Fixed => self.delay,
            BackoffStrategy::Linear => self.delay * attempt.max(1),
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or the attempts run out.
///
/// Only [`ProbeError::Transient`] is retried.
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, ProbeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProbeError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation, attempt);
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.calculate_delay(attempt);
                warn!(
                    "{} failed ({}), retrying in {:?} (attempt {}/{})",
                    operation, e, delay, attempt, max_attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

pub(crate) mod serde_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

pub(crate) mod serde_duration_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_secs()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> ProbeError {
        ProbeError::Transient {
            kind: ComponentKind::Driver,
            reason: "mirror unreachable".to_string(),
        }
    }

    #[test]
    fn test_calculate_delay() {
        let fixed = RetryPolicy::new(3, Duration::from_secs(2), BackoffStrategy::Fixed);
        assert_eq!(fixed.calculate_delay(3), Duration::from_secs(2));

        let linear = RetryPolicy::new(3, Duration::from_secs(2), BackoffStrategy::Linear);
        assert_eq!(linear.calculate_delay(1), Duration::from_secs(2));
        assert_eq!(linear.calculate_delay(3), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO, BackoffStrategy::Fixed);

        let result = retry_with_policy(&policy, "install", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(transient())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO, BackoffStrategy::Linear);

        let result: Result<(), _> = retry_with_policy(&policy, "install", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient())
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO, BackoffStrategy::Fixed);

        let result: Result<(), _> = retry_with_policy(&policy, "install", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProbeError::Fatal {
                kind: ComponentKind::Driver,
                reason: "unsupported gpu".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_yaml_seconds() {
        let policy: RetryPolicy =
            serde_yaml::from_str("max_attempts: 4\ndelay: 10\nbackoff: linear\n").unwrap();
        assert_eq!(policy.delay, Duration::from_secs(10));
        assert_eq!(policy.backoff, BackoffStrategy::Linear);
    }
}
