//! # SimpleDB Copy
//!
//! Copies every domain of an eventually-consistent attribute store from one
//! region (or name) to another, surviving throttling and poison records.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Domain Enumerator                       │
//! │  • One domain per listing page, cycle guard                │
//! │  • Include / exclude filters, rename tag                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                     (one domain at a time)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Provisioner                          │
//! │  • Create missing target, optional delete-and-recreate     │
//! │  • Settle delay after every mutation                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Record Stream Copier                      │
//! │  • Paged selects, optional time filter (incremental)       │
//! │  • Pages go to the writer in order                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Resilient Batch Writer                     │
//! │  • Splits pages into store-sized calls                     │
//! │  • Bisects on write conflicts                              │
//! │  • Quarantines single poison records                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every remote call goes through [`resilience::retry()`], and all cost units,
//! counts and quarantined records land in a run-scoped
//! [`report::RunAccumulator`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use simpledb_copy::{CopyConfig, InMemoryStore, Migrator, Record};
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = Arc::new(InMemoryStore::new());
//!     source.insert("orders", Record::new("o-1").with_attribute("total", "12.50"));
//!
//!     let config = CopyConfig {
//!         exclude_domains: ["sessions".to_string()].into(),
//!         ..Default::default()
//!     };
//!
//!     let migrator = Migrator::new(config, source, Arc::new(InMemoryStore::new()));
//!     let outcome = migrator.run().await;
//!
//!     if let Some(err) = outcome.error {
//!         eprintln!("copy aborted: {err}");
//!     }
//!     println!("{}", outcome.report.quarantine_dump().unwrap_or_default());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`migrator`]: The [`Migrator`] and its components
//! - [`store`]: Store client contract plus in-memory and fault-injecting stores
//! - [`batching`]: Bisecting batch writer
//! - [`resilience`]: Retry with exponential backoff
//! - [`report`]: Run accumulator and final report
//! - [`config`]: [`CopyConfig`]
//! - [`metrics`]: Metrics facade helpers

pub mod config;
pub mod record;
pub mod store;
pub mod batching;
pub mod resilience;
pub mod migrator;
pub mod report;
pub mod metrics;

pub use config::{ConfigError, CopyConfig};
pub use record::{Attribute, CopyMode, DomainDescriptor, Record};
pub use store::{DomainStore, FailingStore, InMemoryStore, StoreError, StoreOp};
pub use batching::{ResilientWriter, WriteOutcome};
pub use migrator::{DomainCopyState, MigrateError, Migrator, RunOutcome};
pub use report::{QuarantineEntry, RunAccumulator, RunReport};
pub use resilience::retry::RetryConfig;
pub use metrics::LatencyTimer;
