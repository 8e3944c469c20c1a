//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Storage conflicts
//! (lost compare-and-swap, unique-key races, a busy database) are the only
//! errors worth retrying.

use std::future::Future;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::config::RetryConfig;
use crate::storage::StorageError;

/// Backoff for write-conflict retries, shaped by `config`.
pub fn conflict_backoff(config: &RetryConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(config.min_delay())
        .with_max_delay(config.max_delay())
        .with_max_times(config.max_attempts)
        .with_jitter()
}

/// Whether a storage error may succeed on retry.
pub fn is_retryable(error: &StorageError) -> bool {
    error.is_conflict()
}

/// Run `operation`, retrying it while it fails with a storage conflict.
///
/// The operation must be safe to repeat after a conflict: either it wrote
/// nothing, or it re-reads what it needs on every attempt. When the retries
/// run out the last conflict is returned.
pub async fn retry_conflicts<T, Fut, F>(
    config: &RetryConfig,
    operation: &'static str,
    run: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    run.retry(conflict_backoff(config))
        .when(is_retryable)
        .notify(|error, delay| {
            warn!(
                operation,
                error = %error,
                retry_in = ?delay,
                "Write conflict, retrying"
            );
        })
        .await
}
