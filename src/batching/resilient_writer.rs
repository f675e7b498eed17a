// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bulk writes that survive poison records.
//!
//! The [`ResilientWriter`] submits a page as insert-or-merge calls of at most
//! [`MAX_BATCH_ITEMS`] records, in order. When the target rejects a batch with
//! a write conflict, the batch is split by position into halves of ⌈n/2⌉ and
//! ⌊n/2⌋, the writer cools down, and each half goes through the same
//! procedure, first half first. A conflict on a single record quarantines
//! that record and the copy carries on.
//!
//! ```text
//!  [r0 r1 r2 r3]  conflict → cooldown
//!   ├─ [r0 r1]    ok
//!   └─ [r2 r3]    conflict → cooldown
//!       ├─ [r2]   ok
//!       └─ [r3]   conflict → quarantined
//! ```
//!
//! Every other error class aborts the write and is returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::record::{Attribute, Record};
use crate::report::RunAccumulator;
use crate::resilience::{retry_store_call, RetryConfig};
use crate::store::{DomainStore, StoreError, StoreOp, MAX_BATCH_ITEMS};

/// Reserved attribute carrying the record's own key for records with nothing else to write.
pub const IDENTITY_ATTRIBUTE: &str = "__record_key";

/// Prepare a batch for the target store.
///
/// Attributes with empty values are dropped. If that leaves any record of the
/// batch without attributes, each such record gets one [`IDENTITY_ATTRIBUTE`]
/// set to its key. Records that keep a real attribute are left as they are.
///
/// ```
/// use simpledb_copy::Record;
/// use simpledb_copy::batching::resilient_writer::{normalize_batch, IDENTITY_ATTRIBUTE};
///
/// let batch = normalize_batch(&[
///     Record::new("a").with_attribute("note", ""),
///     Record::new("b").with_attribute("note", "kept"),
/// ]);
/// assert_eq!(batch[0].attributes.len(), 1);
/// assert_eq!(batch[0].attributes[0].name, IDENTITY_ATTRIBUTE);
/// assert_eq!(batch[0].attributes[0].value, "a");
/// assert_eq!(batch[1].attributes[0].name, "note");
/// ```
#[must_use]
pub fn normalize_batch(records: &[Record]) -> Vec<Record> {
    let mut normalized: Vec<Record> = records
        .iter()
        .map(|record| Record {
            key: record.key.clone(),
            attributes: record
                .attributes
                .iter()
                .filter(|a| !a.is_empty())
                .cloned()
                .collect(),
        })
        .collect();

    if normalized.iter().any(|r| !r.has_attributes()) {
        for record in normalized.iter_mut().filter(|r| !r.has_attributes()) {
            record
                .attributes
                .push(Attribute::new(IDENTITY_ATTRIBUTE, record.key.clone()));
        }
    }
    normalized
}

/// Result of writing one batch. `written + quarantined` equals the batch size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub written: usize,
    pub quarantined: usize,
}

impl WriteOutcome {
    #[must_use]
    pub fn total(&self) -> usize {
        self.written + self.quarantined
    }
}

pub struct ResilientWriter {
    target: Arc<dyn DomainStore>,
    retry: RetryConfig,
    cooldown: Duration,
}

impl ResilientWriter {
    pub fn new(target: Arc<dyn DomainStore>, retry: RetryConfig, cooldown: Duration) -> Self {
        Self {
            target,
            retry,
            cooldown,
        }
    }

    /// Write `batch` to `domain` in chunks of at most [`MAX_BATCH_ITEMS`],
    /// bisecting on write conflicts.
    ///
    /// Write cost and quarantined records go to `acc`; records-copied
    /// accounting is left to the caller.
    pub async fn write(
        &self,
        domain: &str,
        batch: Vec<Record>,
        acc: &mut RunAccumulator,
    ) -> Result<WriteOutcome, StoreError> {
        let mut outcome = WriteOutcome::default();
        // LIFO: earlier chunks and first halves are pushed last so they are written first
        let mut pending = Vec::with_capacity(batch.len().div_ceil(MAX_BATCH_ITEMS));
        let mut rest = batch;
        while rest.len() > MAX_BATCH_ITEMS {
            let tail = rest.split_off(MAX_BATCH_ITEMS);
            pending.push(rest);
            rest = tail;
        }
        pending.push(rest);
        pending.reverse();

        while let Some(chunk) = pending.pop() {
            if chunk.is_empty() {
                continue;
            }
            let normalized = normalize_batch(&chunk);
            let result = retry_store_call(StoreOp::BatchPut, &self.retry, || {
                self.target.batch_put(domain, &normalized)
            })
            .await;

            match result {
                Ok(receipt) => {
                    acc.add_write_cost(receipt.box_usage);
                    outcome.written += chunk.len();
                    crate::metrics::record_batch_write(domain, chunk.len(), "success");
                    debug!(domain, size = chunk.len(), "Batch written");
                }
                Err(err) if err.is_write_conflict() && chunk.len() == 1 => {
                    crate::metrics::record_batch_write(domain, 1, "quarantined");
                    warn!(
                        domain,
                        key = %chunk[0].key,
                        error = %err,
                        "Skipping record after repeated write conflicts; it will be listed in the final report"
                    );
                    outcome.quarantined += 1;
                    acc.add_quarantine(domain, chunk);
                }
                Err(err) if err.is_write_conflict() => {
                    crate::metrics::record_batch_write(domain, chunk.len(), "conflict");
                    crate::metrics::record_bisection(domain, chunk.len());
                    warn!(
                        domain,
                        size = chunk.len(),
                        error = %err,
                        cooldown = ?self.cooldown,
                        "Write conflict, splitting batch and backing off"
                    );
                    let mut first = chunk;
                    let second = first.split_off(first.len().div_ceil(2));
                    sleep(self.cooldown).await;
                    pending.push(second);
                    pending.push(first);
                }
                Err(err) => {
                    crate::metrics::record_batch_write(domain, chunk.len(), "failed");
                    warn!(domain, size = chunk.len(), error = %err, "Error writing records to target domain");
                    return Err(err);
                }
            }
        }
        Ok(outcome)
    }
}
