//! Retry with exponential back-off and jitter for postcodes API calls.
//!
//! Retries are opt-in (`max_retries = 0` by default in configuration): a
//! failed search is normally surfaced to the user, who re-runs it.

use std::future::Future;
use std::time::Duration;

use crate::error::LookupError;

/// Ceiling for a single back-off sleep.
const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// Retriable:
/// - [`LookupError::RateLimited`]: HTTP 429.
/// - [`LookupError::Http`]: timeouts and connection failures.
/// - [`LookupError::UnexpectedStatus`] with a 5xx status.
///
/// Everything else is returned immediately.
pub(crate) fn is_retriable(err: &LookupError) -> bool {
    match err {
        LookupError::RateLimited { .. } => true,
        LookupError::Http(e) => e.is_timeout() || e.is_connect(),
        LookupError::UnexpectedStatus { status, .. } => (500..600).contains(status),
        LookupError::Deserialize { .. }
        | LookupError::BatchTooLarge { .. }
        | LookupError::InvalidBaseUrl { .. }
        | LookupError::Superseded => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Back-off schedule with `backoff_base_ms = 1_000`:
///
/// | Attempt | Sleep before next attempt        |
/// |---------|----------------------------------|
/// | 1       | 1 000 ms × 2⁰ ± 25 % jitter     |
/// | 2       | 1 000 ms × 2¹ ± 25 % jitter     |
/// | 3       | 1 000 ms × 2² ± 25 % jitter     |
///
/// Delay is capped at 60 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, LookupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LookupError>>,
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
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "postcodes API transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
