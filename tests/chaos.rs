//! Chaos Testing for SimpleDB Copy
//!
//! This module tests failure scenarios using:
//! 1. **FailingStore wrappers** - transient throttling, permanent errors and poison records
//! 2. **Misbehaving stores** - listing cursors that cycle, domains that break mid-run
//! 3. **Bad input** - unusable incremental timestamps, attribute-less records
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use simpledb_copy::batching::IDENTITY_ATTRIBUTE;
use simpledb_copy::store::{
    DomainMetadata, ListDomainsPage, SelectPage, SelectRequest, WriteReceipt,
};
use simpledb_copy::{
    CopyConfig, DomainCopyState, DomainStore, FailingStore, InMemoryStore, MigrateError, Migrator,
    Record, StoreError, StoreOp,
};

// =============================================================================
// Misbehaving Stores
// =============================================================================

/// Listing that never ends: always hands out a token and wraps around.
struct CyclingListing {
    inner: InMemoryStore,
    listed: AtomicU64,
}

impl CyclingListing {
    fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            listed: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl DomainStore for CyclingListing {
    async fn list_domains(&self, next_token: Option<&str>) -> Result<ListDomainsPage, StoreError> {
        self.listed.fetch_add(1, Ordering::SeqCst);
        let names = self.inner.domain_names();
        let index: usize = next_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        Ok(ListDomainsPage {
            domain_name: names.get(index % names.len().max(1)).cloned(),
            next_token: Some((index + 1).to_string()),
            box_usage: 0.0,
        })
    }
    async fn domain_metadata(&self, domain: &str) -> Result<DomainMetadata, StoreError> {
        self.inner.domain_metadata(domain).await
    }
    async fn create_domain(&self, domain: &str) -> Result<(), StoreError> {
        self.inner.create_domain(domain).await
    }
    async fn delete_domain(&self, domain: &str) -> Result<(), StoreError> {
        self.inner.delete_domain(domain).await
    }
    async fn select(&self, request: &SelectRequest) -> Result<SelectPage, StoreError> {
        self.inner.select(request).await
    }
    async fn batch_put(&self, domain: &str, records: &[Record]) -> Result<WriteReceipt, StoreError> {
        self.inner.batch_put(domain, records).await
    }
}

/// Selects against one named domain fail with a non-retryable error.
struct BrokenDomain {
    inner: InMemoryStore,
    broken: &'static str,
}

#[async_trait]
impl DomainStore for BrokenDomain {
    async fn list_domains(&self, next_token: Option<&str>) -> Result<ListDomainsPage, StoreError> {
        self.inner.list_domains(next_token).await
    }
    async fn domain_metadata(&self, domain: &str) -> Result<DomainMetadata, StoreError> {
        self.inner.domain_metadata(domain).await
    }
    async fn create_domain(&self, domain: &str) -> Result<(), StoreError> {
        self.inner.create_domain(domain).await
    }
    async fn delete_domain(&self, domain: &str) -> Result<(), StoreError> {
        self.inner.delete_domain(domain).await
    }
    async fn select(&self, request: &SelectRequest) -> Result<SelectPage, StoreError> {
        if request.domain == self.broken {
            return Err(StoreError::Other(format!("{} is corrupted", self.broken)));
        }
        self.inner.select(request).await
    }
    async fn batch_put(&self, domain: &str, records: &[Record]) -> Result<WriteReceipt, StoreError> {
        self.inner.batch_put(domain, records).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn fast_config() -> CopyConfig {
    CopyConfig {
        settle_delay_ms: 0,
        conflict_cooldown_ms: 0,
        retry_initial_delay_ms: 1,
        retry_max_delay_ms: 5,
        ..Default::default()
    }
}

fn seed(store: &InMemoryStore, domain: &str, count: usize) {
    for i in 0..count {
        store.insert(domain, Record::new(format!("{domain}-{i}")).with_attribute("n", i.to_string()));
    }
}

// =============================================================================
// Write Conflicts
// =============================================================================

#[tokio::test]
async fn chaos_poison_record_is_quarantined() {
    let source = Arc::new(InMemoryStore::new());
    seed(&source, "orders", 4);
    let target = Arc::new(FailingStore::new(InMemoryStore::new()));
    target.poison("orders-3");

    let outcome = Migrator::new(fast_config(), source, target.clone()).run().await;

    assert!(outcome.is_success());
    assert_eq!(outcome.report.records_copied, 3);
    assert_eq!(outcome.report.quarantine.len(), 1);
    assert_eq!(outcome.report.quarantine[0].domain, "orders");
    assert_eq!(outcome.report.quarantine[0].records[0].key, "orders-3");
    assert_eq!(target.inner().records("orders").unwrap().len(), 3);

    let dump: serde_json::Value = serde_json::from_str(&outcome.report.quarantine_dump().unwrap()).unwrap();
    assert_eq!(dump["skippedItems"][0]["items"][0]["name"], "orders-3");
}

#[tokio::test(start_paused = true)]
async fn chaos_conflict_cooldown_and_settle_delay_are_honoured() {
    let source = Arc::new(InMemoryStore::new());
    seed(&source, "orders", 4);
    let target = Arc::new(FailingStore::new(InMemoryStore::new()));
    target.poison("orders-3");
    let config = CopyConfig {
        settle_delay_ms: 10_000,
        conflict_cooldown_ms: 5_000,
        ..Default::default()
    };
    let start = tokio::time::Instant::now();

    Migrator::new(config, source, target).run().await;

    // create settle + two splits
    assert_eq!(start.elapsed(), Duration::from_secs(20));
}

#[tokio::test]
async fn chaos_attributeless_records_get_identity_attribute() {
    let source = Arc::new(InMemoryStore::new());
    source.insert("tags", Record::new("t-1").with_attribute("label", ""));
    source.insert("tags", Record::new("t-2").with_attribute("label", ""));
    let target = Arc::new(InMemoryStore::new());

    let outcome = Migrator::new(fast_config(), source, target.clone()).run().await;

    assert_eq!(outcome.report.records_copied, 2);
    for record in target.records("tags").unwrap() {
        assert_eq!(record.attributes.len(), 1);
        assert_eq!(record.attributes[0].name, IDENTITY_ATTRIBUTE);
        assert_eq!(record.attributes[0].value, record.key);
    }
}

// =============================================================================
// Transient Failures
// =============================================================================

#[tokio::test]
async fn chaos_throttling_is_retried_everywhere() {
    let source = Arc::new(FailingStore::new(InMemoryStore::new()));
    seed(source.inner(), "orders", 30);
    source.fail_next(StoreOp::ListDomains, 2);
    source.fail_next(StoreOp::Select, 3);
    let target = Arc::new(FailingStore::new(InMemoryStore::new()));
    target.fail_next(StoreOp::DomainMetadata, 1);
    target.fail_next(StoreOp::BatchPut, 2);

    let outcome = Migrator::new(fast_config(), source.clone(), target.clone()).run().await;

    assert!(outcome.is_success());
    assert_eq!(outcome.report.records_copied, 30);
    assert_eq!(source.injected_failures(), 5);
    assert_eq!(target.injected_failures(), 3);
}

#[tokio::test]
async fn chaos_exhausted_retries_abort_the_run() {
    let source = Arc::new(FailingStore::new(InMemoryStore::new()));
    seed(source.inner(), "orders", 3);
    source.fail_next(StoreOp::Select, 100);
    let config = CopyConfig {
        retry_max_tries: 4,
        ..fast_config()
    };

    let migrator = Migrator::new(config, source.clone(), Arc::new(InMemoryStore::new()));
    let outcome = migrator.run().await;

    let err = outcome.error.expect("run should fail");
    assert_eq!(err.store_error(), Some(&StoreError::Transient("injected select failure".into())));
    assert_eq!(source.attempts(StoreOp::Select), 4);
    assert_eq!(migrator.state(), DomainCopyState::Failed);
}

// =============================================================================
// Fatal Errors
// =============================================================================

#[tokio::test]
async fn chaos_fatal_error_keeps_earlier_progress_in_report() {
    let inner = InMemoryStore::new();
    seed(&inner, "alpha", 5);
    seed(&inner, "beta", 5);
    seed(&inner, "gamma", 5);
    let source = Arc::new(BrokenDomain { inner, broken: "beta" });
    let target = Arc::new(InMemoryStore::new());

    let outcome = Migrator::new(fast_config(), source, target.clone()).run().await;

    assert!(matches!(
        outcome.error,
        Some(MigrateError::Store { operation: StoreOp::Select, .. })
    ));
    assert_eq!(outcome.report.domains_copied, 1);
    assert_eq!(outcome.report.records_copied, 5);
    assert!(!target.has_domain("gamma"));
}

#[tokio::test]
async fn chaos_bad_reference_timestamp_skips_only_that_domain() {
    let source = Arc::new(InMemoryStore::new());
    seed(&source, "events", 10);
    let target = Arc::new(InMemoryStore::new());
    let config = CopyConfig {
        incremental_domains: ["events".to_string()].into(),
        reference_timestamp: Some("2024-13-45".into()),
        ..fast_config()
    };

    let outcome = Migrator::new(config, source.clone(), target.clone()).run().await;

    assert!(outcome.is_success());
    assert_eq!(source.calls().select, 0);
    assert_eq!(target.calls().mutating(), 0);
    assert_eq!(outcome.report.failed_domains.len(), 1);
    assert_eq!(outcome.report.domains_copied, 0);
}

#[tokio::test]
async fn chaos_missing_reference_timestamp_is_a_validation_failure() {
    let source = Arc::new(InMemoryStore::new());
    seed(&source, "events", 2);
    let config = CopyConfig {
        incremental_domains: ["events".to_string()].into(),
        ..fast_config()
    };

    let outcome = Migrator::new(config, source, Arc::new(InMemoryStore::new())).run().await;

    assert!(outcome.report.failed_domains[0].reason.contains("reference timestamp"));
}

// =============================================================================
// Listing Anomalies
// =============================================================================

#[tokio::test]
async fn chaos_cycling_listing_halts_without_recopying() {
    let inner = InMemoryStore::new();
    seed(&inner, "orders", 2);
    seed(&inner, "users", 2);
    let source = Arc::new(CyclingListing::new(inner));
    let target = Arc::new(InMemoryStore::new());

    let outcome = Migrator::new(fast_config(), source.clone(), target.clone()).run().await;

    assert!(outcome.is_success());
    assert_eq!(outcome.report.domains_copied, 2);
    assert_eq!(source.listed.load(Ordering::SeqCst), 3);
    assert_eq!(target.calls().batch_put, 2);
}

#[tokio::test]
async fn chaos_vanished_source_domain_is_skipped() {
    let source = Arc::new(FailingStore::new(InMemoryStore::new()));
    seed(source.inner(), "orders", 2);
    source.fail_always(StoreOp::DomainMetadata, StoreError::NotFound("orders".into()));
    let target = Arc::new(InMemoryStore::new());

    let outcome = Migrator::new(fast_config(), source, target.clone()).run().await;

    assert!(outcome.is_success());
    assert_eq!(outcome.report.skipped_domains, vec!["orders"]);
    assert_eq!(target.calls().mutating(), 0);
}
