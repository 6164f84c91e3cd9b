//! Exponential-backoff retry for fallible async operations
//!
//! Attempts run strictly one after another inside the caller's task. The
//! delay before retry `i` (0-indexed) is `base_delay_ms * 2^i`, with no jitter
//! and no cap. Every error is treated as retryable, and only the error of the
//! final attempt is returned.

use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 0;

/// Parameters for one retried call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Delay before the second attempt, doubled for every later one
    pub base_delay_ms: u64,
    /// One-off delay before the very first attempt (0 = none)
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        RetryPolicy {
            max_retries,
            base_delay_ms,
            initial_delay_ms: 0,
        }
    }

    pub fn with_initial_delay(mut self, initial_delay_ms: u64) -> Self {
        self.initial_delay_ms = initial_delay_ms;
        self
    }

    /// Backoff before retry `attempt` (0 for the first retry)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.initial_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.initial_delay_ms)).await;
        }

        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_retries => return Err(err),
                Err(_) => {
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Run `operation` up to `max_retries + 1` times.
///
/// Returns the first success immediately. When every attempt fails, the last
/// attempt's error is returned unchanged; earlier errors are dropped silently.
pub async fn retry_with_exponential_backoff<F, Fut, T, E>(
    operation: F,
    max_retries: u32,
    base_delay_ms: u64,
    initial_delay_ms: u64,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryPolicy {
        max_retries,
        base_delay_ms,
        initial_delay_ms,
    }
    .run(operation)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    struct AttemptError(u32);

    /// Collects records logged from this module
    struct ModuleLog(Mutex<Vec<String>>);

    impl log::Log for ModuleLog {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            if record.target().starts_with(module_path!()) {
                self.0.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    static MODULE_LOG: ModuleLog = ModuleLog(Mutex::new(Vec::new()));

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempts_are_silent() {
        let _ = log::set_logger(&MODULE_LOG);
        log::set_max_level(log::LevelFilter::Trace);

        let result: Result<(), AttemptError> =
            retry_with_exponential_backoff(|| async { Err(AttemptError(1)) }, 3, 1000, 0).await;

        assert_eq!(result, Err(AttemptError(1)));
        assert!(MODULE_LOG.0.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_calls_n_plus_one_times() {
        for n in 0..5u32 {
            let calls = AtomicU32::new(0);
            let result: Result<(), AttemptError> = retry_with_exponential_backoff(
                || {
                    let c = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Err(AttemptError(c)) }
                },
                n,
                10,
                0,
            )
            .await;

            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), n + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, AttemptError> = retry_with_exponential_backoff(
            || {
                let c = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if c < 2 {
                        Err(AttemptError(c))
                    } else {
                        Ok("done")
                    }
                }
            },
            5,
            100,
            0,
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AttemptError> = retry_with_exponential_backoff(
            || {
                let c = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(AttemptError(c)) }
            },
            2,
            500,
            0,
        )
        .await;

        assert_eq!(result, Err(AttemptError(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles() {
        let start = Instant::now();
        let stamps = Arc::new(Mutex::new(Vec::new()));

        let recorder = stamps.clone();
        let _: Result<(), AttemptError> = retry_with_exponential_backoff(
            move || {
                recorder.lock().unwrap().push(start.elapsed());
                async { Err(AttemptError(0)) }
            },
            3,
            1000,
            0,
        )
        .await;

        let stamps = stamps.lock().unwrap();
        let gaps: Vec<u128> = stamps
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        assert_eq!(gaps, vec![1000, 2000, 4000]);
        assert_eq!(stamps[0].as_millis(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay_without_retries() {
        let start = Instant::now();
        let first_call = Arc::new(Mutex::new(None));

        let recorder = first_call.clone();
        let failed: Result<(), AttemptError> = retry_with_exponential_backoff(
            move || {
                recorder.lock().unwrap().get_or_insert(start.elapsed());
                async { Err(AttemptError(1)) }
            },
            0,
            1000,
            2000,
        )
        .await;

        assert_eq!(failed, Err(AttemptError(1)));
        let first = *first_call.lock().unwrap();
        assert_eq!(first.map(|d| d.as_millis()), Some(2000));
        // No backoff after the single failed attempt
        assert_eq!(start.elapsed().as_millis(), 2000);

        let start = Instant::now();
        let ok: Result<u8, AttemptError> =
            retry_with_exponential_backoff(|| async { Ok(7) }, 0, 1000, 2000).await;
        assert_eq!(ok, Ok(7));
        assert_eq!(start.elapsed().as_millis(), 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let start = Instant::now();
        let calls = AtomicU32::new(0);
        let result: Result<u32, AttemptError> = retry_with_exponential_backoff(
            || {
                let c = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if c <= 2 {
                        Err(AttemptError(c))
                    } else {
                        Ok(c * 10)
                    }
                }
            },
            3,
            1000,
            0,
        )
        .await;

        assert_eq!(result, Ok(30));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed().as_millis(), 3000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_fails_with_two_retries() {
        let start = Instant::now();
        let calls = AtomicU32::new(0);
        let result: Result<(), AttemptError> = retry_with_exponential_backoff(
            || {
                let c = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(AttemptError(c)) }
            },
            2,
            500,
            0,
        )
        .await;

        assert_eq!(result, Err(AttemptError(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed().as_millis(), 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_defaults_and_run() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.initial_delay_ms, 0);

        let calls = AtomicU32::new(0);
        let result: Result<(), AttemptError> = RetryPolicy::new(1, 10)
            .with_initial_delay(5)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError(0)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let policy = RetryPolicy::new(100, 1000);
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(8000));
        assert_eq!(policy.backoff_delay(80), Duration::from_millis(u64::MAX));
    }
}
