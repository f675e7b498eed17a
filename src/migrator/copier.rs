// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Paged record streaming from a source domain into the resilient writer.
//!
//! Each select page is handed to the writer as one batch, which splits it into
//! store-sized calls. The copy ends on the first empty page or when the service
//! stops returning a continuation token.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::types::{DomainCopyOutcome, DomainCopyState, MigrateError, StateHandle};
use crate::batching::ResilientWriter;
use crate::record::CopyMode;
use crate::report::RunAccumulator;
use crate::resilience::{retry_store_call, RetryConfig};
use crate::store::{DomainStore, OneOrMany, SelectRequest, StoreOp, TimeFilter};

/// Parse the reference timestamp an incremental copy filters on.
///
/// Full copies ignore `raw` and yield `None`. Incremental copies fail with
/// [`MigrateError::Validation`] when the timestamp is missing or not RFC 3339.
///
/// ```
/// use simpledb_copy::record::CopyMode;
/// use simpledb_copy::migrator::reference_instant;
///
/// assert!(reference_instant(CopyMode::Full, Some("garbage"), "d").unwrap().is_none());
/// assert!(reference_instant(CopyMode::Incremental, Some("garbage"), "d").is_err());
/// assert!(reference_instant(CopyMode::Incremental, Some("2024-05-01T00:00:00Z"), "d").unwrap().is_some());
/// ```
pub fn reference_instant(
    mode: CopyMode,
    raw: Option<&str>,
    domain: &str,
) -> Result<Option<DateTime<Utc>>, MigrateError> {
    if !mode.is_incremental() {
        return Ok(None);
    }
    let raw = raw.ok_or_else(|| MigrateError::Validation {
        domain: domain.to_string(),
        reason: "incremental copy requires a reference timestamp".to_string(),
    })?;
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| Some(instant.with_timezone(&Utc)))
        .map_err(|e| MigrateError::Validation {
            domain: domain.to_string(),
            reason: format!("reference timestamp '{raw}' is not RFC 3339: {e}"),
        })
}

/// Rounded share of `estimate` covered by `processed`, or `None` without an estimate.
#[must_use]
pub fn progress_percent(processed: u64, estimate: u64) -> Option<u64> {
    (estimate > 0).then(|| (processed as f64 * 100.0 / estimate as f64).round() as u64)
}

/// One domain copy request.
#[derive(Debug, Clone)]
pub struct CopyRequest<'a> {
    pub source_domain: &'a str,
    pub target_domain: &'a str,
    pub record_estimate: u64,
    pub mode: CopyMode,
    pub reference_timestamp: Option<&'a str>,
    /// Resume from a previous continuation token
    pub start_token: Option<String>,
}

pub struct RecordCopier {
    source: Arc<dyn DomainStore>,
    retry: RetryConfig,
    page_size: usize,
    consistent_read: bool,
    timestamp_attribute: String,
    state: StateHandle,
}

impl RecordCopier {
    pub fn new(
        source: Arc<dyn DomainStore>,
        retry: RetryConfig,
        page_size: usize,
        consistent_read: bool,
        timestamp_attribute: impl Into<String>,
        state: StateHandle,
    ) -> Self {
        Self {
            source,
            retry,
            page_size,
            consistent_read,
            timestamp_attribute: timestamp_attribute.into(),
            state,
        }
    }

    /// Stream every matching record of the source domain into `writer`.
    ///
    /// The incremental reference timestamp is checked before the first read.
    pub async fn copy(
        &self,
        request: CopyRequest<'_>,
        writer: &ResilientWriter,
        acc: &mut RunAccumulator,
    ) -> Result<DomainCopyOutcome, MigrateError> {
        let since = reference_instant(request.mode, request.reference_timestamp, request.source_domain)?;

        let mut select = SelectRequest {
            domain: request.source_domain.to_string(),
            limit: self.page_size,
            newer_than: since.map(|after| TimeFilter {
                attribute: self.timestamp_attribute.clone(),
                after,
            }),
            consistent_read: self.consistent_read,
            next_token: request.start_token,
        };
        debug!(expression = %select.expression(), "Selecting from source domain");

        let mut outcome = DomainCopyOutcome::default();
        loop {
            self.state.set(DomainCopyState::Selecting);
            let page = retry_store_call(StoreOp::Select, &self.retry, || self.source.select(&select))
                .await
                .map_err(|e| MigrateError::store(StoreOp::Select, e))?;
            acc.add_read_cost(page.box_usage);

            let records = page.items.map(OneOrMany::into_vec).unwrap_or_default();
            if records.is_empty() {
                break;
            }
            outcome.pages += 1;
            outcome.records_read += records.len() as u64;

            self.state.set(DomainCopyState::Writing);
            let written = writer
                .write(request.target_domain, records, acc)
                .await
                .map_err(|e| MigrateError::store(StoreOp::BatchPut, e))?;
            acc.add_records_copied(request.target_domain, written.written);
            outcome.records_written += written.written as u64;
            outcome.records_quarantined += written.quarantined as u64;

            match progress_percent(outcome.records_read, request.record_estimate) {
                Some(percent) => {
                    crate::metrics::set_domain_progress(request.source_domain, percent);
                    info!(
                        domain = request.source_domain,
                        copied = outcome.records_written,
                        percent,
                        "Copy progress"
                    );
                }
                None => info!(domain = request.source_domain, copied = outcome.records_written, "Copy progress"),
            }

            self.state.set(DomainCopyState::Advancing);
            match page.next_token {
                Some(token) => select.next_token = Some(token),
                None => break,
            }
        }
        Ok(outcome)
    }
}
