use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff without jitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// 只嘗試一次的策略
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// 第 `attempt + 1` 次嘗試前的等待時間（從 1 起算）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Runs `op` until it succeeds, returns a non-retryable error, or the
/// attempt budget is spent. Only for idempotent calls.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "🔁 {} failed (attempt {}/{}): {}; retrying in {:?}",
                    label,
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ProcureError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn upstream(status: u16) -> ProcureError {
        ProcureError::UpstreamError {
            service: "test".to_string(),
            status,
            body: String::new(),
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay_ms: 1,
            multiplier: 2.0,
            max_delay_ms: 4,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(10), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry(&fast_policy(3), "llm", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(upstream(503))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_on_terminal_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(&fast_policy(5), "llm", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(upstream(401))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(&fast_policy(2), "llm", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(upstream(429))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disabled_policy_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let _: Result<()> = tokio_test::block_on(retry(&RetryPolicy::disabled(), "llm", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(upstream(503))
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
