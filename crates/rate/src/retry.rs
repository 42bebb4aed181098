//! Classified bounded retry with jittered exponential backoff.
//!
//! A failure is re-attempted only when its error says so
//! ([`AppError::is_retryable`]). Exhaustion surfaces a synthetic rate-limited
//! error wrapping the last cause, so callers can distinguish "the provider
//! said no" from "we gave up pacing". Jitter comes from the OS CSPRNG to
//! frustrate adversarial timing.

use std::future::Future;
use std::time::Duration;

use rand::TryRngCore;
use tokio::time::Instant;
use tracing::debug;

use domainclaw_core::error::{AppError, Result};

use crate::deadline_exceeded;

const BACKOFF_BASE: Duration = Duration::from_millis(250);
const JITTER_CEILING_MS: u32 = 250;

/// Invoke `body` up to `attempts` times.
///
/// Stop conditions, in order: success returns the value; a non-retryable
/// error returns unchanged; the final attempt's failure returns a synthetic
/// rate-limited error wrapping it. Between attempts the engine sleeps
/// `250ms · 2^i + U(0, 250ms)`; if `deadline` fires during the wait, the
/// caller's timeout error is returned instead of a retry error.
pub async fn retry<T, F, Fut>(deadline: Option<Instant>, attempts: u32, mut body: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    for attempt in 0..attempts {
        let err = match body().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_retryable() {
            return Err(err);
        }
        if attempt == attempts - 1 {
            return Err(AppError::rate_limited("request exhausted retries").with_cause(err));
        }

        let wait = BACKOFF_BASE * 2u32.pow(attempt) + Duration::from_millis(u64::from(jitter_ms()));
        debug!(attempt = attempt + 1, wait_ms = wait.as_millis() as u64, "retrying after backoff");
        let wake = Instant::now() + wait;
        if let Some(deadline) = deadline {
            if deadline < wake {
                tokio::time::sleep_until(deadline).await;
                return Err(deadline_exceeded());
            }
        }
        tokio::time::sleep_until(wake).await;
    }
    unreachable!("retry loop always returns")
}

/// Uniform jitter in [0, 250) ms from the OS CSPRNG. A read failure
/// degrades to zero jitter rather than aborting the retry.
fn jitter_ms() -> u32 {
    rand::rngs::OsRng
        .try_next_u32()
        .map(|v| v % JITTER_CEILING_MS)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainclaw_core::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn success_on_first_attempt_makes_one_call() {
        let calls = AtomicU32::new(0);
        let out = retry(None, 3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(42)
        })
        .await
        .unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_unchanged() {
        let calls = AtomicU32::new(0);
        let err = retry(None, 3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(AppError::validation("bad domain"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_error_then_success() {
        let calls = AtomicU32::new(0);
        let out = retry(None, 3, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::provider("connection reset").retryable(true))
            } else {
                Ok("order-1")
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "order-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_kind_is_retried_without_flag() {
        let calls = AtomicU32::new(0);
        let out = retry(None, 2, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::rate_limited("provider rate limited"))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(out.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_wraps_last_cause_as_rate_limited() {
        let calls = AtomicU32::new(0);
        let err = retry(None, 3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(AppError::provider("upstream 503").retryable(true))
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.message, "request exhausted retries");
        let source = std::error::Error::source(&err).expect("cause");
        assert!(source.to_string().contains("upstream 503"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_backoff_surfaces_timeout() {
        let deadline = Instant::now() + Duration::from_millis(100);
        let err = retry(Some(deadline), 5, || async {
            Err::<(), _>(AppError::rate_limited("slow down"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.message, "deadline exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_exponentially() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let _ = retry(None, 3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(AppError::rate_limited("busy"))
        })
        .await;
        // Two backoff waits: 250ms + 500ms, plus up to 250ms jitter each.
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_millis(750), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1250), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn zero_attempts_is_clamped_to_one() {
        let calls = AtomicU32::new(0);
        let _ = retry(None, 0, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(())
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
