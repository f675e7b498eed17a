// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic with exponential backoff.
//!
//! Only errors classified as transient are retried; every other error is
//! returned on the first attempt. The delay before retry `n` is
//! `initial_delay × factor^n`, so it grows strictly with the attempt count
//! until it reaches `max_delay`.
//!
//! # Example
//!
//! ```
//! use simpledb_copy::RetryConfig;
//! use std::time::Duration;
//!
//! let config = RetryConfig::remote();
//! assert_eq!(config.max_tries, 5);
//! assert_eq!(config.delay_for(1), Duration::from_millis(400));
//! assert_eq!(config.delay_for(2), Duration::from_millis(800));
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::store::{ErrorClass, StoreError, StoreOp};

/// Errors that can tell whether retrying the same call may succeed.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Configuration for remote-call retry behavior.
///
/// Use the preset constructors for common patterns:
/// - [`RetryConfig::remote()`] - default for store calls
/// - [`RetryConfig::patient()`] - long runs against a throttling store
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first (values below 1 act as 1)
    pub max_tries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::remote()
    }
}

impl RetryConfig {
    /// 5 attempts, delays of 400ms, 800ms, 1.6s, 3.2s.
    #[must_use]
    pub fn remote() -> Self {
        Self {
            max_tries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(60),
            factor: 2.0,
        }
    }

    /// 10 attempts starting at 1s, capped at 5 minutes.
    #[must_use]
    pub fn patient() -> Self {
        Self {
            max_tries: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(300),
            factor: 2.0,
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_tries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(100),
            factor: 2.0,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_nanos() as f64 * self.factor.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(scaled.round() as u64)
    }
}

/// Run `operation` until it succeeds, fails non-transiently, or runs out of attempts.
///
/// The final error is returned unchanged.
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_tries = config.max_tries.max(1);
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(val) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempts = attempt, "Operation succeeded after retries");
                }
                return Ok(val);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= max_tries => {
                warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %err,
                    "Retries exhausted"
                );
                crate::metrics::record_retry_exhausted(operation_name);
                return Err(err);
            }
            Err(err) => {
                let delay = config.delay_for(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_tries,
                    error = %err,
                    ?delay,
                    "Operation failed, retrying"
                );
                crate::metrics::record_retry(operation_name);
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// [`retry`] for one store operation, with latency and outcome metrics.
pub async fn retry_store_call<F, Fut, T>(
    op: StoreOp,
    config: &RetryConfig,
    operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let _timer = crate::metrics::LatencyTimer::new(op.as_str());
    let result = retry(op.as_str(), config, operation).await;
    let status = match &result {
        Ok(_) => "success".to_string(),
        Err(err) => err.class().to_string(),
    };
    crate::metrics::record_remote_call(op.as_str(), &status);
    result
}
