//! Retry policies for transient failures
//!
//! A [`RetryPolicy`] bundles everything that decides whether and when an
//! operation is tried again: the attempt budget, the delay schedule and the
//! filter selecting which errors are worth retrying. Call placement uses
//! [`RetryPolicy::gateway_redial`], a single retry two seconds after a
//! gateway error; token refresh uses [`RetryPolicy::token_refresh`].
//!
//! ```rust
//! use voicehub_core::recovery::RetryPolicy;
//! use voicehub_core::ClientError;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::gateway_redial(2, Duration::from_secs(2));
//! assert_eq!(policy.max_attempts, 2);
//! assert!(policy.should_retry(&ClientError::call_placement(Some(31005), "gateway")));
//! assert!(!policy.should_retry(&ClientError::call_placement(Some(31486), "busy")));
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::{ClientError, ClientResult};

/// Predicate selecting the errors a policy retries
pub type RetryFilter = Arc<dyn Fn(&ClientError) -> bool + Send + Sync>;

/// Configuration for retry behavior
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add ±10% jitter to delays
    pub use_jitter: bool,
    retry_on: RetryFilter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            use_jitter: true,
            retry_on: Arc::new(ClientError::is_recoverable),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("use_jitter", &self.use_jitter)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Fixed-delay redial on the provider gateway error only
    pub fn gateway_redial(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            use_jitter: false,
            retry_on: Arc::new(ClientError::is_gateway_error),
        }
    }

    /// Credential refresh: a few quick attempts with backoff
    pub fn token_refresh(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            use_jitter: true,
            retry_on: Arc::new(|e: &ClientError| matches!(e, ClientError::CredentialFetch { .. } | ClientError::Network { .. })),
        }
    }

    /// Replace the error filter
    pub fn retry_if<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ClientError) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Arc::new(filter);
        self
    }

    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    pub fn should_retry(&self, error: &ClientError) -> bool {
        (self.retry_on)(error)
    }

    /// Delay to wait before attempt `attempt + 1`, given `attempt` (1-based)
    /// has just failed. Jitter is not included.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.use_jitter {
            return delay;
        }
        let jitter = (rand::random::<f64>() - 0.5) * 0.2; // ±10% jitter
        let millis = delay.as_millis() as f64;
        Duration::from_millis((millis * (1.0 + jitter)) as u64)
    }
}

/// Retry an operation under `policy`
pub async fn retry_with_backoff<T, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    operation: F,
) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    retry_with_notify(operation_name, policy, operation, |_, _, _| {}).await
}

/// Retry an operation under `policy`, calling `on_retry(error, attempt,
/// delay)` before each wait
pub async fn retry_with_notify<T, F, Fut, N>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: N,
) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
    N: FnMut(&ClientError, u32, Duration),
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = policy.max_attempts,
            "Attempting operation"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt = attempt, "Operation succeeded after retries");
                }
                return Ok(result);
            }
            Err(e) if policy.should_retry(&e) && attempt < policy.max_attempts => {
                let delay = policy.jittered(policy.delay_after(attempt));
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %e,
                    category = %e.category(),
                    next_delay_ms = delay.as_millis() as u64,
                    "Retryable error, will retry"
                );
                on_retry(&e, attempt, delay);
                sleep(delay).await;
            }
            Err(e) => {
                if attempt > 1 {
                    error!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %e,
                        "Operation failed after retrying"
                    );
                } else {
                    error!(
                        operation = operation_name,
                        error = %e,
                        category = %e.category(),
                        "Operation failed, not retrying"
                    );
                }
                return Err(e);
            }
        }
    }
}
