use std::future::Future;
use std::time::Duration;

use tracing::warn;
use vibe_core::{Result, VibeError};

/// Retry schedule for side-effecting LLM invocations.
///
/// An attempt fails when the operation errors or returns an empty or
/// whitespace-only response. Between attempts the policy sleeps with
/// exponential base-2 backoff (1s, 2s, ... for the default base delay).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay slept before the given attempt (attempts are 1-based; the
    /// first attempt has no delay).
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 {
            None
        } else {
            Some(self.base_delay * 2u32.pow(attempt - 2))
        }
    }

    /// Run `op` under this policy, returning the first non-empty response.
    ///
    /// Exhaustion produces a single aggregated error naming the attempt
    /// count and the last underlying failure.
    pub async fn run<F, Fut>(&self, mut op: F) -> Result<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let mut last_error = String::from("no attempts were made");

        for attempt in 1..=self.max_attempts {
            if let Some(delay) = self.delay_before(attempt) {
                tokio::time::sleep(delay).await;
            }

            match op().await {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => {
                    last_error = "empty response from LLM".to_string();
                    warn!(
                        "LLM returned an empty response (attempt {}/{})",
                        attempt, self.max_attempts
                    );
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        "LLM invocation failed (attempt {}/{}): {}",
                        attempt, self.max_attempts, last_error
                    );
                }
            }
        }

        Err(VibeError::Llm(format!(
            "LLM invocation failed after {} attempts: {}",
            self.max_attempts, last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_with_backoff() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::default();
        let start = Instant::now();

        let counter = calls.clone();
        let result = policy
            .run(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Ok(String::new())
                    } else {
                        Ok("enhanced".to_string())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "enhanced");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s before attempt 2 plus 2s before attempt 3, in virtual time.
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_names_attempt_count_and_last_cause() {
        let policy = RetryPolicy::default();
        let err = policy
            .run(|| async { Ok::<String, VibeError>("   ".to_string()) })
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("3 attempts"));
        assert!(message.contains("empty response"));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::default();

        let counter = calls.clone();
        let result = policy
            .run(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Err(VibeError::Llm("connection reset".into()))
                    } else {
                        Ok("ok".to_string())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delay_schedule_is_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_before(4), Some(Duration::from_secs(4)));
    }
}
