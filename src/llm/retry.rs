//! Exponential backoff retry for backend calls.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::debug;

use crate::error::ProviderError;

/// 3 total attempts, base 1s, max 30s.
pub const MAX_ATTEMPTS: u32 = 3;
const INITIAL_INTERVAL_SECS: u64 = 1;
const MAX_INTERVAL_SECS: u64 = 30;

/// Errors that will not go away by asking again.
fn is_permanent(err: &ProviderError) -> bool {
    match err {
        ProviderError::NotInstalled(_) => true,
        ProviderError::Api { status, .. } => matches!(status, 400 | 401 | 403 | 404),
        _ => false,
    }
}

/// Retry `attempt` with exponential backoff.
///
/// Permanent errors are returned immediately. After `MAX_ATTEMPTS` transient
/// failures the last error is wrapped in [`ProviderError::RetriesExhausted`].
pub async fn retry_with_backoff<T, Fut, F>(provider: &str, mut attempt: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_secs(INITIAL_INTERVAL_SECS),
        max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut attempts = 0;
    loop {
        attempts += 1;

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if is_permanent(&e) => return Err(e),
            Err(e) if attempts >= MAX_ATTEMPTS => {
                return Err(ProviderError::RetriesExhausted(Box::new(e)));
            }
            Err(e) => {
                debug!("{provider} attempt {attempts}/{MAX_ATTEMPTS} failed: {e}");
                if let Some(wait_duration) = backoff.next_backoff() {
                    tokio::time::sleep(wait_duration).await;
                }
            }
        }
    }
}
