// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::Record;

/// Failure classes the pipeline reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Domain does not exist
    NotFound,
    /// Retry-safe: the same call may succeed unchanged
    Transient,
    /// Payload-specific rejection of a write
    WriteConflict,
    /// Anything else
    Other,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Transient => write!(f, "transient"),
            Self::WriteConflict => write!(f, "write_conflict"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Domain not found: {0}")]
    NotFound(String),
    #[error("Transient store failure: {0}")]
    Transient(String),
    #[error("Write rejected: {0}")]
    WriteConflict(String),
    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::Transient(_) => ErrorClass::Transient,
            Self::WriteConflict(_) => ErrorClass::WriteConflict,
            Self::Other(_) => ErrorClass::Other,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    #[must_use]
    pub fn is_write_conflict(&self) -> bool {
        self.class() == ErrorClass::WriteConflict
    }
}

/// Remote operations, used for logging, metrics and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListDomains,
    DomainMetadata,
    CreateDomain,
    DeleteDomain,
    Select,
    BatchPut,
}

impl StoreOp {
    pub const ALL: [StoreOp; 6] = [
        Self::ListDomains,
        Self::DomainMetadata,
        Self::CreateDomain,
        Self::DeleteDomain,
        Self::Select,
        Self::BatchPut,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListDomains => "list_domains",
            Self::DomainMetadata => "domain_metadata",
            Self::CreateDomain => "create_domain",
            Self::DeleteDomain => "delete_domain",
            Self::Select => "select",
            Self::BatchPut => "batch_put",
        }
    }

    /// Operations that change store state.
    #[must_use]
    pub fn is_mutating(self) -> bool {
        matches!(self, Self::CreateDomain | Self::DeleteDomain | Self::BatchPut)
    }
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page of the domain listing (at most one domain per page).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListDomainsPage {
    pub domain_name: Option<String>,
    pub next_token: Option<String>,
    pub box_usage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainMetadata {
    pub item_count: u64,
}

/// Restricts a select to records whose timestamp attribute is newer than `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFilter {
    pub attribute: String,
    pub after: DateTime<Utc>,
}

impl TimeFilter {
    /// The instant as stored in attribute values (RFC 3339, millisecond precision, `Z`).
    #[must_use]
    pub fn literal(&self) -> String {
        self.after.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// A page-bounded select against one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectRequest {
    pub domain: String,
    pub limit: usize,
    pub newer_than: Option<TimeFilter>,
    pub consistent_read: bool,
    pub next_token: Option<String>,
}

impl SelectRequest {
    /// Render the request as a select expression.
    ///
    /// ```
    /// use simpledb_copy::store::SelectRequest;
    ///
    /// let req = SelectRequest {
    ///     domain: "orders".into(),
    ///     limit: 25,
    ///     newer_than: None,
    ///     consistent_read: false,
    ///     next_token: None,
    /// };
    /// assert_eq!(req.expression(), "select * from `orders` limit 25");
    /// ```
    #[must_use]
    pub fn expression(&self) -> String {
        let mut expr = format!("select * from {}", quote_identifier(&self.domain));
        if let Some(filter) = &self.newer_than {
            expr.push_str(&format!(
                " where {} > {}",
                quote_identifier(&filter.attribute),
                quote_literal(&filter.literal())
            ));
        }
        expr.push_str(&format!(" limit {}", self.limit));
        expr
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Either a single element or a list, as returned by wire formats that
/// collapse one-element lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

/// One page of select results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectPage {
    pub items: Option<OneOrMany<Record>>,
    pub next_token: Option<String>,
    pub box_usage: f64,
}

/// Largest batch a single `batch_put` may carry.
pub const MAX_BATCH_ITEMS: usize = 25;

/// Outcome of a successful bulk write.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WriteReceipt {
    pub box_usage: f64,
}

/// Client contract for an eventually-consistent attribute store.
///
/// Source and target are independent instances (different regions or
/// accounts); credentials are the implementor's concern.
#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn list_domains(&self, next_token: Option<&str>) -> Result<ListDomainsPage, StoreError>;
    async fn domain_metadata(&self, domain: &str) -> Result<DomainMetadata, StoreError>;
    async fn create_domain(&self, domain: &str) -> Result<(), StoreError>;
    async fn delete_domain(&self, domain: &str) -> Result<(), StoreError>;
    async fn select(&self, request: &SelectRequest) -> Result<SelectPage, StoreError>;

    /// Insert-or-merge every record; existing attributes are never replaced.
    ///
    /// Callers send at most [`MAX_BATCH_ITEMS`] records per call.
    async fn batch_put(&self, domain: &str, records: &[Record]) -> Result<WriteReceipt, StoreError>;
}
