//! Public types for the migrator.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::config::ConfigError;
use crate::report::RunReport;
use crate::store::{StoreError, StoreOp};

/// Copy state machine.
///
/// ```text
/// Idle → Listing → Provisioning → Selecting ⇄ Writing → Advancing → … → Done | Failed
/// ```
///
/// Use [`super::Migrator::state()`] to check the current state or
/// [`super::Migrator::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainCopyState {
    /// Nothing started yet
    Idle,
    /// Fetching the next listing page
    Listing,
    /// Making sure the target domain exists (and is empty when pruning)
    Provisioning,
    /// Reading a page from the source domain
    Selecting,
    /// Writing a page to the target domain
    Writing,
    /// Moving to the next page
    Advancing,
    /// Domain (or run) finished
    Done,
    /// Domain (or run) aborted
    Failed,
}

impl std::fmt::Display for DomainCopyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Listing => write!(f, "Listing"),
            Self::Provisioning => write!(f, "Provisioning"),
            Self::Selecting => write!(f, "Selecting"),
            Self::Writing => write!(f, "Writing"),
            Self::Advancing => write!(f, "Advancing"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Shared publisher for [`DomainCopyState`] transitions.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<watch::Sender<DomainCopyState>>);

impl StateHandle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DomainCopyState::Idle);
        Self(Arc::new(tx))
    }

    pub fn set(&self, state: DomainCopyState) {
        crate::metrics::set_copy_state(&state.to_string());
        self.0.send_replace(state);
    }

    #[must_use]
    pub fn get(&self) -> DomainCopyState {
        *self.0.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DomainCopyState> {
        self.0.subscribe()
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("{operation} failed: {source}")]
    Store {
        operation: StoreOp,
        #[source]
        source: StoreError,
    },
    #[error("Validation failed for domain '{domain}': {reason}")]
    Validation { domain: String, reason: String },
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Provisioning of '{domain}' failed: {reason}")]
    Provisioning { domain: String, reason: String },
}

impl MigrateError {
    pub fn store(operation: StoreOp, source: StoreError) -> Self {
        Self::Store { operation, source }
    }

    /// Failures that abandon one domain but let the run continue.
    #[must_use]
    pub fn is_domain_local(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// The store error behind this failure, if any.
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Counters for one domain copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainCopyOutcome {
    /// Non-empty select pages processed
    pub pages: u64,
    pub records_read: u64,
    pub records_written: u64,
    pub records_quarantined: u64,
}

/// What [`super::Migrator::run`] hands back: the report always, the fatal error if any.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub error: Option<MigrateError>,
}

impl RunOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
