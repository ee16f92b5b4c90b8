//! Bounded retry with exponential back-off and jitter.
//!
//! Used only around browser start-up plumbing (DevTools endpoint discovery),
//! where the endpoint legitimately takes a moment to appear. Flow waits do
//! not use this: they get exactly one longer retry inside `Session`.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Returns `true` for errors that can clear up on their own while a browser
/// process is still starting.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::DevToolsNotReady { .. } => true,
        ScraperError::Http(e) => e.is_connect() || e.is_timeout() || e.is_decode(),
        _ => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// retriable errors, sleeping `backoff_base_ms × 2^n ± 25 %` between them
/// (capped at 5 s). Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    const MAX_DELAY_MS: u64 = 5_000;
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
                tracing::debug!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "browser endpoint not ready, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
