// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store client contract and bundled implementations.
//!
//! - [`traits`]: the [`DomainStore`] trait, error classes and page types
//! - [`memory`]: DashMap-backed store for tests and dry runs
//! - [`failing`]: fault-injecting wrapper for resilience tests

pub mod traits;
pub mod memory;
pub mod failing;

pub use traits::{
    DomainMetadata, DomainStore, ErrorClass, ListDomainsPage, OneOrMany, SelectPage,
    SelectRequest, StoreError, StoreOp, TimeFilter, WriteReceipt, MAX_BATCH_ITEMS,
};
pub use memory::{CallCounts, InMemoryStore};
pub use failing::FailingStore;
