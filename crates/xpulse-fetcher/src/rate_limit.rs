//! Retry with exponential back-off and jitter for content API calls.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors worth retrying after a back-off delay:
/// network failures, HTTP 429, and HTTP 5xx.
///
/// Other 4xx responses and malformed bodies are returned immediately.
pub(crate) fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        FetchError::RateLimited { .. } => true,
        FetchError::UnexpectedStatus { status, .. } => *status >= 500,
        FetchError::Deserialize { .. }
        | FetchError::Unauthorized { .. }
        | FetchError::PaginationLimit { .. }
        | FetchError::InvalidBaseUrl(_)
        | FetchError::MissingApiKey
        | FetchError::Cancelled => false,
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at 60 s, then scaled by a random factor in `[0.75, 1.25)`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32) -> u64 {
    let computed = backoff_base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64
}

/// Delay before retry number `attempt` after `err`. A rate-limit response
/// waits at least as long as its `Retry-After`, up to the 60 s cap.
fn retry_delay_ms(err: &FetchError, backoff_base_ms: u64, attempt: u32) -> u64 {
    let backoff = backoff_delay_ms(backoff_base_ms, attempt);
    match err {
        FetchError::RateLimited { retry_after_secs } => {
            backoff.max(retry_after_secs.saturating_mul(1_000).min(MAX_DELAY_MS))
        }
        _ => backoff,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = retry_delay_ms(&err, backoff_base_ms, attempt);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "content API transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn deserialize_err() -> FetchError {
        let src = serde_json::from_str::<()>("invalid").unwrap_err();
        FetchError::Deserialize {
            context: "test".to_owned(),
            source: src,
        }
    }

    #[test]
    fn rate_limit_and_server_errors_are_retriable() {
        assert!(is_retriable(&FetchError::RateLimited {
            retry_after_secs: 1
        }));
        assert!(is_retriable(&FetchError::UnexpectedStatus {
            status: 503,
            url: "u".to_owned()
        }));
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!is_retriable(&FetchError::UnexpectedStatus {
            status: 400,
            url: "u".to_owned()
        }));
        assert!(!is_retriable(&FetchError::Unauthorized { status: 401 }));
        assert!(!is_retriable(&deserialize_err()));
    }

    #[test]
    fn backoff_delay_is_jittered_and_capped() {
        for attempt in 1..=3 {
            let nominal = 1_000u64 << (attempt - 1);
            let delay = backoff_delay_ms(1_000, attempt);
            assert!(delay >= nominal * 3 / 4, "attempt {attempt}: {delay}");
            assert!(delay < nominal * 5 / 4, "attempt {attempt}: {delay}");
        }
        assert!(backoff_delay_ms(1_000, 30) < MAX_DELAY_MS * 5 / 4);
        assert_eq!(backoff_delay_ms(0, 5), 0);
    }

    #[test]
    fn rate_limit_waits_for_retry_after() {
        let err = FetchError::RateLimited {
            retry_after_secs: 5,
        };
        assert_eq!(retry_delay_ms(&err, 0, 1), 5_000);
        assert!(retry_delay_ms(&err, 20_000, 1) >= 15_000);

        let huge = FetchError::RateLimited {
            retry_after_secs: 3_600,
        };
        assert_eq!(retry_delay_ms(&huge, 0, 1), MAX_DELAY_MS);

        let server_error = FetchError::UnexpectedStatus {
            status: 503,
            url: "u".to_owned(),
        };
        assert_eq!(retry_delay_ms(&server_error, 0, 1), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_sleeps_for_retry_after() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let started = tokio::time::Instant::now();
        let result = retry_with_backoff(1, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FetchError::RateLimited {
                        retry_after_secs: 2,
                    })
                } else {
                    Ok(1u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FetchError::RateLimited {
                        retry_after_secs: 0,
                    })
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FetchError::UnexpectedStatus {
                    status: 502,
                    url: "u".to_owned(),
                })
            }
        })
        .await;
        assert!(matches!(
            result,
            Err(FetchError::UnexpectedStatus { status: 502, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "1 attempt + 2 retries");
    }

    #[tokio::test]
    async fn does_not_retry_unauthorized() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FetchError::Unauthorized { status: 403 })
            }
        })
        .await;
        assert!(matches!(result, Err(FetchError::Unauthorized { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
