//! Resilience primitives for remote calls.

pub mod retry;

pub use retry::{retry, retry_store_call, RetryConfig, Retryable};
