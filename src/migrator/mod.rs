// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Copy run orchestration.
//!
//! The [`Migrator`] ties the components together:
//! - [`DomainEnumerator`] walks the source listing and applies filters
//! - [`Provisioner`] makes sure each target domain exists
//! - [`RecordCopier`] streams select pages from the source
//! - [`ResilientWriter`] writes each page, isolating poison records
//!
//! Domains are copied one at a time, in listing order. A domain whose
//! incremental reference timestamp is unusable is reported as failed and the
//! run moves on; any other error ends the run. Either way a [`RunReport`] is
//! produced and logged.
//!
//! # Lifecycle
//!
//! ```text
//! Idle → Listing → Provisioning → Selecting ⇄ Writing → Advancing → … → Done | Failed
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use simpledb_copy::{CopyConfig, DomainCopyState, InMemoryStore, Migrator};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let source = Arc::new(InMemoryStore::new());
//! let target = Arc::new(InMemoryStore::new());
//! let migrator = Migrator::new(CopyConfig::default(), source, target);
//!
//! assert_eq!(migrator.state(), DomainCopyState::Idle);
//! let outcome = migrator.run().await;
//! println!("copied {} records", outcome.report.records_copied);
//! # }
//! ```
//!
//! [`RunReport`]: crate::report::RunReport

mod copier;
mod enumerator;
mod provisioner;
mod types;

pub use copier::{progress_percent, reference_instant, CopyRequest, RecordCopier};
pub use enumerator::DomainEnumerator;
pub use provisioner::{Provisioned, Provisioner, MAX_PRUNE_ROUNDS};
pub use types::{DomainCopyOutcome, DomainCopyState, MigrateError, RunOutcome, StateHandle};

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::batching::ResilientWriter;
use crate::config::CopyConfig;
use crate::record::DomainDescriptor;
use crate::report::RunAccumulator;
use crate::store::DomainStore;

pub struct Migrator {
    config: CopyConfig,
    source: Arc<dyn DomainStore>,
    provisioner: Provisioner,
    copier: RecordCopier,
    writer: ResilientWriter,
    state: StateHandle,
}

impl Migrator {
    /// Wire up a migrator. Configuration is validated when [`run`](Self::run) starts.
    pub fn new(config: CopyConfig, source: Arc<dyn DomainStore>, target: Arc<dyn DomainStore>) -> Self {
        let retry = config.retry_config();
        let state = StateHandle::new();
        Self {
            provisioner: Provisioner::new(target.clone(), retry.clone(), config.settle_delay()),
            copier: RecordCopier::new(
                source.clone(),
                retry.clone(),
                config.select_page_size,
                config.consistent_read,
                config.timestamp_attribute.clone(),
                state.clone(),
            ),
            writer: ResilientWriter::new(target, retry, config.conflict_cooldown()),
            config,
            source,
            state,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> DomainCopyState {
        self.state.get()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<DomainCopyState> {
        self.state.subscribe()
    }

    /// Copy every selected domain. The report is always produced and logged.
    pub async fn run(&self) -> RunOutcome {
        let mut acc = RunAccumulator::default();
        let result = self.run_domains(&mut acc).await;

        match &result {
            Ok(()) => self.state.set(DomainCopyState::Done),
            Err(e) => {
                error!(error = %e, "Copy run aborted");
                self.state.set(DomainCopyState::Failed);
            }
        }

        let report = acc.finish();
        report.emit();
        RunOutcome {
            report,
            error: result.err(),
        }
    }

    async fn run_domains(&self, acc: &mut RunAccumulator) -> Result<(), MigrateError> {
        self.config.validate()?;
        info!(
            source_region = %self.config.source_region,
            target_region = %self.config.target_region,
            rename_tag = ?self.config.rename_tag,
            "Starting copy run"
        );

        let mut enumerator =
            DomainEnumerator::new(self.source.clone(), self.config.retry_config(), &self.config);

        loop {
            self.state.set(DomainCopyState::Listing);
            let Some(domain) = enumerator.next_domain(acc).await? else {
                break;
            };

            match self.copy_domain(&domain, acc).await {
                Ok(outcome) => {
                    acc.domain_copied();
                    info!(
                        domain = %domain.name,
                        target = %domain.target_name,
                        records = outcome.records_written,
                        quarantined = outcome.records_quarantined,
                        "Domain copied"
                    );
                }
                Err(e) if e.is_domain_local() => {
                    error!(domain = %domain.name, error = %e, "Domain copy abandoned");
                    self.state.set(DomainCopyState::Failed);
                    acc.domain_failed(&domain.name, e.to_string());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    #[tracing::instrument(
        skip(self, domain, acc),
        fields(domain = %domain.name, target = %domain.target_name, mode = %domain.mode)
    )]
    async fn copy_domain(
        &self,
        domain: &DomainDescriptor,
        acc: &mut RunAccumulator,
    ) -> Result<DomainCopyOutcome, MigrateError> {
        // Reject a bad reference timestamp before touching the target
        reference_instant(domain.mode, self.config.reference_timestamp.as_deref(), &domain.name)?;

        self.state.set(DomainCopyState::Provisioning);
        let prune = self.config.prune_before_copy && !domain.mode.is_incremental();
        let provisioned = self.provisioner.ensure(&domain.target_name, prune).await?;
        info!(
            records = domain.record_estimate,
            ?provisioned,
            "Copying domain"
        );

        let request = CopyRequest {
            source_domain: &domain.name,
            target_domain: &domain.target_name,
            record_estimate: domain.record_estimate,
            mode: domain.mode,
            reference_timestamp: self.config.reference_timestamp.as_deref(),
            start_token: None,
        };
        let outcome = self.copier.copy(request, &self.writer, acc).await?;
        self.state.set(DomainCopyState::Done);
        Ok(outcome)
    }
}
