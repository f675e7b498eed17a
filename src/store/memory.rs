// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory [`DomainStore`] with SimpleDB-like paging and merge semantics.
//!
//! - Listing returns one domain per page, continuation tokens are offsets.
//! - Select pages are ordered by item name; a one-item page comes back as
//!   [`OneOrMany::One`] the way the wire format collapses it.
//! - `batch_put` merges attributes (no replace), caps batches at
//!   [`MAX_BATCH_ITEMS`] and rejects attribute-less items with a write conflict.
//! - Every call is counted per operation, see [`InMemoryStore::calls`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{
    DomainMetadata, DomainStore, ListDomainsPage, OneOrMany, SelectPage, SelectRequest,
    StoreError, StoreOp, WriteReceipt, MAX_BATCH_ITEMS,
};
use crate::record::{Attribute, Record};

const DEFAULT_BOX_USAGE: f64 = 0.000_021_996_1;

type Items = BTreeMap<String, Vec<Attribute>>;

/// Per-operation call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_domains: u64,
    pub domain_metadata: u64,
    pub create_domain: u64,
    pub delete_domain: u64,
    pub select: u64,
    pub batch_put: u64,
}

impl CallCounts {
    #[must_use]
    pub fn get(&self, op: StoreOp) -> u64 {
        match op {
            StoreOp::ListDomains => self.list_domains,
            StoreOp::DomainMetadata => self.domain_metadata,
            StoreOp::CreateDomain => self.create_domain,
            StoreOp::DeleteDomain => self.delete_domain,
            StoreOp::Select => self.select,
            StoreOp::BatchPut => self.batch_put,
        }
    }

    /// Calls that changed (or tried to change) store state.
    #[must_use]
    pub fn mutating(&self) -> u64 {
        StoreOp::ALL
            .into_iter()
            .filter(|op| op.is_mutating())
            .map(|op| self.get(op))
            .sum()
    }
}

pub struct InMemoryStore {
    domains: DashMap<String, Items>,
    counters: [AtomicU64; 6],
    box_usage: f64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            domains: DashMap::new(),
            counters: Default::default(),
            box_usage: DEFAULT_BOX_USAGE,
        }
    }

    /// Cost units reported for every call.
    #[must_use]
    pub fn with_box_usage(mut self, box_usage: f64) -> Self {
        self.box_usage = box_usage;
        self
    }

    /// Create an empty domain if missing (not counted as a call).
    pub fn ensure_domain(&self, domain: &str) {
        self.domains.entry(domain.to_string()).or_default();
    }

    /// Seed a record, creating the domain if needed (not counted as a call).
    pub fn insert(&self, domain: &str, record: Record) {
        let mut items = self.domains.entry(domain.to_string()).or_default();
        items.insert(record.key, record.attributes);
    }

    /// Snapshot of a domain's records ordered by key.
    #[must_use]
    pub fn records(&self, domain: &str) -> Option<Vec<Record>> {
        self.domains.get(domain).map(|items| {
            items
                .iter()
                .map(|(key, attributes)| Record {
                    key: key.clone(),
                    attributes: attributes.clone(),
                })
                .collect()
        })
    }

    #[must_use]
    pub fn domain_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.domains.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains.contains_key(domain)
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        let load = |op: StoreOp| self.counters[Self::slot(op)].load(Ordering::SeqCst);
        CallCounts {
            list_domains: load(StoreOp::ListDomains),
            domain_metadata: load(StoreOp::DomainMetadata),
            create_domain: load(StoreOp::CreateDomain),
            delete_domain: load(StoreOp::DeleteDomain),
            select: load(StoreOp::Select),
            batch_put: load(StoreOp::BatchPut),
        }
    }

    fn slot(op: StoreOp) -> usize {
        match op {
            StoreOp::ListDomains => 0,
            StoreOp::DomainMetadata => 1,
            StoreOp::CreateDomain => 2,
            StoreOp::DeleteDomain => 3,
            StoreOp::Select => 4,
            StoreOp::BatchPut => 5,
        }
    }

    fn count(&self, op: StoreOp) {
        self.counters[Self::slot(op)].fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_offset(token: Option<&str>) -> Result<usize, StoreError> {
    match token {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| StoreError::Other(format!("invalid next token '{raw}'"))),
    }
}

#[async_trait]
impl DomainStore for InMemoryStore {
    async fn list_domains(&self, next_token: Option<&str>) -> Result<ListDomainsPage, StoreError> {
        self.count(StoreOp::ListDomains);
        let offset = parse_offset(next_token)?;
        let names = self.domain_names();

        let domain_name = names.get(offset).cloned();
        let next_token = (offset + 1 < names.len()).then(|| (offset + 1).to_string());
        Ok(ListDomainsPage {
            domain_name,
            next_token,
            box_usage: self.box_usage,
        })
    }

    async fn domain_metadata(&self, domain: &str) -> Result<DomainMetadata, StoreError> {
        self.count(StoreOp::DomainMetadata);
        self.domains
            .get(domain)
            .map(|items| DomainMetadata {
                item_count: items.len() as u64,
            })
            .ok_or_else(|| StoreError::NotFound(domain.to_string()))
    }

    async fn create_domain(&self, domain: &str) -> Result<(), StoreError> {
        self.count(StoreOp::CreateDomain);
        self.ensure_domain(domain);
        Ok(())
    }

    async fn delete_domain(&self, domain: &str) -> Result<(), StoreError> {
        self.count(StoreOp::DeleteDomain);
        self.domains.remove(domain);
        Ok(())
    }

    async fn select(&self, request: &SelectRequest) -> Result<SelectPage, StoreError> {
        self.count(StoreOp::Select);
        if request.limit == 0 {
            return Err(StoreError::Other("select limit must be positive".into()));
        }
        let offset = parse_offset(request.next_token.as_deref())?;

        let items = self
            .domains
            .get(&request.domain)
            .ok_or_else(|| StoreError::NotFound(request.domain.clone()))?;

        let threshold = request.newer_than.as_ref().map(|f| (f.attribute.as_str(), f.literal()));
        let matching: Vec<Record> = items
            .iter()
            .filter(|(_, attributes)| match &threshold {
                Some((name, literal)) => attributes
                    .iter()
                    .any(|a| a.name == *name && a.value.as_str() > literal.as_str()),
                None => true,
            })
            .map(|(key, attributes)| Record {
                key: key.clone(),
                attributes: attributes.clone(),
            })
            .collect();
        drop(items);

        let total = matching.len();
        let mut page: Vec<Record> = matching.into_iter().skip(offset).take(request.limit).collect();
        let next_token = (offset + request.limit < total).then(|| (offset + request.limit).to_string());

        let items = match page.len() {
            0 => None,
            1 => page.pop().map(OneOrMany::One),
            _ => Some(OneOrMany::Many(page)),
        };
        Ok(SelectPage {
            items,
            next_token,
            box_usage: self.box_usage,
        })
    }

    async fn batch_put(&self, domain: &str, records: &[Record]) -> Result<WriteReceipt, StoreError> {
        self.count(StoreOp::BatchPut);
        if records.len() > MAX_BATCH_ITEMS {
            return Err(StoreError::Other(format!(
                "batch of {} items exceeds limit of {}",
                records.len(),
                MAX_BATCH_ITEMS
            )));
        }
        if let Some(bare) = records.iter().find(|r| !r.has_attributes()) {
            return Err(StoreError::WriteConflict(format!(
                "item '{}' has no attributes",
                bare.key
            )));
        }

        let mut items = self
            .domains
            .get_mut(domain)
            .ok_or_else(|| StoreError::NotFound(domain.to_string()))?;

        for record in records {
            let existing = items.entry(record.key.clone()).or_default();
            for attribute in &record.attributes {
                if !existing.contains(attribute) {
                    existing.push(attribute.clone());
                }
            }
        }
        Ok(WriteReceipt {
            box_usage: self.box_usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::traits::TimeFilter;
    use chrono::{TimeZone, Utc};

    fn request(domain: &str, limit: usize, token: Option<String>) -> SelectRequest {
        SelectRequest {
            domain: domain.into(),
            limit,
            newer_than: None,
            consistent_read: false,
            next_token: token,
        }
    }

    fn seeded(count: usize) -> InMemoryStore {
        let store = InMemoryStore::new();
        for i in 0..count {
            store.insert("orders", Record::new(format!("order-{i:03}")).with_attribute("n", i.to_string()));
        }
        store
    }

    #[tokio::test]
    async fn test_list_domains_one_per_page() {
        let store = InMemoryStore::new();
        store.ensure_domain("b");
        store.ensure_domain("a");

        let first = store.list_domains(None).await.unwrap();
        assert_eq!(first.domain_name.as_deref(), Some("a"));
        assert_eq!(first.next_token.as_deref(), Some("1"));

        let second = store.list_domains(first.next_token.as_deref()).await.unwrap();
        assert_eq!(second.domain_name.as_deref(), Some("b"));
        assert!(second.next_token.is_none());
        assert_eq!(store.calls().list_domains, 2);
    }

    #[tokio::test]
    async fn test_list_domains_empty_store() {
        let store = InMemoryStore::new();
        let page = store.list_domains(None).await.unwrap();
        assert!(page.domain_name.is_none());
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_select_pages_in_key_order() {
        let store = seeded(40);

        let first = store.select(&request("orders", 25, None)).await.unwrap();
        let first_items = first.items.unwrap().into_vec();
        assert_eq!(first_items.len(), 25);
        assert_eq!(first_items[0].key, "order-000");
        assert_eq!(first.next_token.as_deref(), Some("25"));

        let second = store.select(&request("orders", 25, first.next_token)).await.unwrap();
        assert_eq!(second.items.unwrap().into_vec().len(), 15);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_select_single_result_is_collapsed() {
        let store = seeded(1);
        let page = store.select(&request("orders", 25, None)).await.unwrap();
        assert!(matches!(page.items, Some(OneOrMany::One(_))));
    }

    #[tokio::test]
    async fn test_select_missing_domain() {
        let store = InMemoryStore::new();
        let err = store.select(&request("nope", 25, None)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_select_time_filter() {
        let store = InMemoryStore::new();
        store.insert("events", Record::new("old").with_attribute("updatedAt", "2023-12-31T00:00:00.000Z"));
        store.insert("events", Record::new("new").with_attribute("updatedAt", "2024-02-01T00:00:00.000Z"));
        store.insert("events", Record::new("untimed").with_attribute("kind", "x"));

        let mut req = request("events", 25, None);
        req.newer_than = Some(TimeFilter {
            attribute: "updatedAt".into(),
            after: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        });

        let items = store.select(&req).await.unwrap().items.unwrap().into_vec();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, "new");
    }

    #[tokio::test]
    async fn test_batch_put_merges_without_replacing() {
        let store = InMemoryStore::new();
        store.insert("users", Record::new("u1").with_attribute("role", "admin"));

        store
            .batch_put("users", &[Record::new("u1").with_attribute("role", "editor").with_attribute("role", "admin")])
            .await
            .unwrap();

        let records = store.records("users").unwrap();
        assert_eq!(records[0].values("role").collect::<Vec<_>>(), vec!["admin", "editor"]);
    }

    #[tokio::test]
    async fn test_batch_put_rejects_attributeless_item_atomically() {
        let store = InMemoryStore::new();
        store.ensure_domain("users");

        let err = store
            .batch_put("users", &[Record::new("ok").with_attribute("a", "1"), Record::new("bare")])
            .await
            .unwrap_err();

        assert!(err.is_write_conflict());
        assert!(store.records("users").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_put_limits() {
        let store = InMemoryStore::new();
        let records: Vec<Record> = (0..26).map(|i| Record::new(i.to_string()).with_attribute("a", "1")).collect();

        let err = store.batch_put("users", &records[..1]).await.unwrap_err();
        assert!(err.is_not_found());

        store.ensure_domain("users");
        let err = store.batch_put("users", &records).await.unwrap_err();
        assert_eq!(err.class(), crate::store::ErrorClass::Other);
    }

    #[tokio::test]
    async fn test_call_counts() {
        let store = InMemoryStore::new();
        store.create_domain("d").await.unwrap();
        store.create_domain("d").await.unwrap();
        let _ = store.domain_metadata("d").await.unwrap();
        store.delete_domain("d").await.unwrap();

        let calls = store.calls();
        assert_eq!(calls.create_domain, 2);
        assert_eq!(calls.domain_metadata, 1);
        assert_eq!(calls.mutating(), 3);
        assert!(!store.has_domain("d"));
    }
}
