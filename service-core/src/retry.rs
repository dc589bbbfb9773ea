//! Retry utilities for transient database failures.
//!
//! Provides configurable retry logic with exponential backoff for sqlx calls.
//! Only connection-level failures are retried; integrity violations and other
//! statement-level errors fail immediately.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Initial backoff duration before first retry.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff duration.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the specified max retries.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a config with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a config for quick retries (smaller backoffs).
    pub fn quick() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Calculate backoff duration for a given attempt.
    fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;

        let mut duration = Duration::from_millis(backoff_ms);

        if self.add_jitter {
            // Add up to 25% jitter
            let jitter = (backoff_ms as f64 * 0.25 * rand_jitter()) as u64;
            duration += Duration::from_millis(jitter);
        }

        duration
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0) without external dependencies.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Determines if a database error is transient and worth retrying.
pub fn is_transient(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::PoolTimedOut      // Pool acquire timed out
        | sqlx::Error::PoolClosed      // Pool shutting down or restarting
        | sqlx::Error::WorkerCrashed   // Connection worker died mid-flight
        | sqlx::Error::Io(_)           // Broken connection
        | sqlx::Error::Tls(_) // TLS handshake failure
    )
}

/// Determines if a database error is definitely not retryable.
///
/// Constraint violations arrive as `Error::Database`; retrying them would
/// re-run a statement the database has already rejected.
pub fn is_permanent_failure(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(_)           // Unique/FK/check violation, syntax error
        | sqlx::Error::RowNotFound         // fetch_one against a missing row
        | sqlx::Error::ColumnNotFound(_)   // Query/struct mismatch
        | sqlx::Error::ColumnDecode { .. } // Type mismatch while decoding
        | sqlx::Error::Decode(_)
        | sqlx::Error::Configuration(_)
    )
}

/// Execute a database call with retry logic.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name of the operation for logging
/// * `f` - The async function that performs the database call
///
/// # Example
/// ```ignore
/// let result = retry_db_call(
///     &RetryConfig::default(),
///     "insert_transactions",
///     || async {
///         db.insert_transaction_batch(receivable_id, &lines).await
///     }
/// ).await;
/// ```
pub async fn retry_db_call<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "Database call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= config.max_retries {
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        error = %error,
                        "Database call failed after max retries"
                    );
                    return Err(error);
                }

                if is_permanent_failure(&error) {
                    warn!(
                        operation = operation_name,
                        error = %error,
                        "Database call failed with permanent error, not retrying"
                    );
                    return Err(error);
                }

                if !is_transient(&error) {
                    warn!(
                        operation = operation_name,
                        error = %error,
                        "Database call failed with non-retryable error"
                    );
                    return Err(error);
                }

                let backoff = config.backoff_duration(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %error,
                    backoff_ms = backoff.as_millis(),
                    "Database call failed, retrying after backoff"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_duration() {
        let config = RetryConfig {
            add_jitter: false,
            ..Default::default()
        };

        assert_eq!(config.backoff_duration(0), Duration::from_millis(100));
        assert_eq!(config.backoff_duration(1), Duration::from_millis(200));
        assert_eq!(config.backoff_duration(2), Duration::from_millis(400));
    }

    #[test]
    fn test_is_transient() {
        assert!(is_transient(&sqlx::Error::PoolTimedOut));
        assert!(is_transient(&sqlx::Error::PoolClosed));
        assert!(!is_transient(&sqlx::Error::RowNotFound));
        assert!(!is_transient(&sqlx::Error::ColumnNotFound(
            "status".to_string()
        )));
    }

    #[test]
    fn test_is_permanent_failure() {
        assert!(is_permanent_failure(&sqlx::Error::RowNotFound));
        assert!(is_permanent_failure(&sqlx::Error::ColumnNotFound(
            "amount".to_string()
        )));
        assert!(!is_permanent_failure(&sqlx::Error::PoolTimedOut));
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let config = RetryConfig::default();
        let result =
            retry_db_call(&config, "test_op", || async { Ok::<_, sqlx::Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_permanent_failure_not_retried() {
        let attempts = AtomicU32::new(0);
        let attempts_ref = &attempts;
        let config = RetryConfig::quick();
        let result = retry_db_call(&config, "test_op", move || async move {
            attempts_ref.fetch_add(1, Ordering::SeqCst);
            Err::<i32, _>(sqlx::Error::RowNotFound)
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_transient_then_success() {
        let attempts = AtomicU32::new(0);
        let attempts_ref = &attempts;
        let config = RetryConfig::quick();
        let result = retry_db_call(&config, "test_op", move || async move {
            if attempts_ref.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(sqlx::Error::PoolTimedOut)
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
