// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fault-injecting [`DomainStore`] wrapper for resilience testing.
//!
//! Wraps any store and injects:
//! - transient bursts: the next N calls of an operation fail with
//!   [`StoreError::Transient`]
//! - permanent failures: every call of an operation fails with a given error
//! - poison records: any `batch_put` containing a poisoned key fails with
//!   [`StoreError::WriteConflict`]
//!
//! Injected failures never reach the inner store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{
    DomainMetadata, DomainStore, ListDomainsPage, SelectPage, SelectRequest, StoreError, StoreOp,
    WriteReceipt,
};
use crate::record::Record;

pub struct FailingStore<S: DomainStore> {
    inner: S,
    transient: Mutex<HashMap<StoreOp, u32>>,
    permanent: Mutex<HashMap<StoreOp, StoreError>>,
    poison_keys: Mutex<HashSet<String>>,
    attempts: Mutex<HashMap<StoreOp, u64>>,
    injected: Mutex<u64>,
}

impl<S: DomainStore> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            transient: Mutex::new(HashMap::new()),
            permanent: Mutex::new(HashMap::new()),
            poison_keys: Mutex::new(HashSet::new()),
            attempts: Mutex::new(HashMap::new()),
            injected: Mutex::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail the next `times` calls of `op` with a transient error.
    pub fn fail_next(&self, op: StoreOp, times: u32) {
        *self.transient.lock().entry(op).or_insert(0) += times;
    }

    /// Fail every call of `op` with `error`.
    pub fn fail_always(&self, op: StoreOp, error: StoreError) {
        self.permanent.lock().insert(op, error);
    }

    /// Reject any batch containing `key` with a write conflict.
    pub fn poison(&self, key: impl Into<String>) {
        self.poison_keys.lock().insert(key.into());
    }

    /// Calls made to `op`, including injected failures.
    #[must_use]
    pub fn attempts(&self, op: StoreOp) -> u64 {
        self.attempts.lock().get(&op).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn injected_failures(&self) -> u64 {
        *self.injected.lock()
    }

    fn maybe_fail(&self, op: StoreOp) -> Result<(), StoreError> {
        *self.attempts.lock().entry(op).or_insert(0) += 1;

        if let Some(err) = self.permanent.lock().get(&op) {
            *self.injected.lock() += 1;
            return Err(err.clone());
        }

        let mut transient = self.transient.lock();
        if let Some(remaining) = transient.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                *self.injected.lock() += 1;
                return Err(StoreError::Transient(format!("injected {op} failure")));
            }
        }
        Ok(())
    }

    fn check_poison(&self, records: &[Record]) -> Result<(), StoreError> {
        let poison = self.poison_keys.lock();
        match records.iter().find(|r| poison.contains(&r.key)) {
            Some(record) => {
                *self.injected.lock() += 1;
                Err(StoreError::WriteConflict(format!(
                    "item '{}' rejected by target",
                    record.key
                )))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: DomainStore> DomainStore for FailingStore<S> {
    async fn list_domains(&self, next_token: Option<&str>) -> Result<ListDomainsPage, StoreError> {
        self.maybe_fail(StoreOp::ListDomains)?;
        self.inner.list_domains(next_token).await
    }

    async fn domain_metadata(&self, domain: &str) -> Result<DomainMetadata, StoreError> {
        self.maybe_fail(StoreOp::DomainMetadata)?;
        self.inner.domain_metadata(domain).await
    }

    async fn create_domain(&self, domain: &str) -> Result<(), StoreError> {
        self.maybe_fail(StoreOp::CreateDomain)?;
        self.inner.create_domain(domain).await
    }

    async fn delete_domain(&self, domain: &str) -> Result<(), StoreError> {
        self.maybe_fail(StoreOp::DeleteDomain)?;
        self.inner.delete_domain(domain).await
    }

    async fn select(&self, request: &SelectRequest) -> Result<SelectPage, StoreError> {
        self.maybe_fail(StoreOp::Select)?;
        self.inner.select(request).await
    }

    async fn batch_put(&self, domain: &str, records: &[Record]) -> Result<WriteReceipt, StoreError> {
        self.maybe_fail(StoreOp::BatchPut)?;
        self.check_poison(records)?;
        self.inner.batch_put(domain, records).await
    }
}
