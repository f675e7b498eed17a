// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record and domain data structures.
//!
//! A [`Record`] is the unit that flows from the source store to the target
//! store: a unique key plus an ordered list of (name, value) attributes.
//! Attribute names may repeat (multi-valued attributes) and values may be
//! empty.
//!
//! # Example
//!
//! ```
//! use simpledb_copy::Record;
//!
//! let record = Record::new("order-1")
//!     .with_attribute("status", "shipped")
//!     .with_attribute("tag", "priority")
//!     .with_attribute("tag", "gift");
//!
//! assert_eq!(record.key, "order-1");
//! assert_eq!(record.values("tag").count(), 2);
//! ```

use serde::{Deserialize, Serialize};

/// A single (name, value) attribute pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// True when the value is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// A uniquely keyed record with zero or more attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Item name in the store (unique within a domain)
    #[serde(rename = "name")]
    pub key: String,
    /// Attributes in the order the store returned them
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Record {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute append (keeps duplicates).
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    /// All values stored under `name`, in order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .iter()
            .filter(move |a| a.name == name)
            .map(|a| a.value.as_str())
    }

    #[must_use]
    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }
}

/// How a domain is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Every record in the domain
    Full,
    /// Only records newer than the configured reference instant
    Incremental,
}

impl CopyMode {
    #[must_use]
    pub fn is_incremental(self) -> bool {
        matches!(self, Self::Incremental)
    }
}

impl std::fmt::Display for CopyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// A source domain selected for copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDescriptor {
    /// Domain name in the source store
    pub name: String,
    /// Domain name in the target store (source name + rename tag)
    pub target_name: String,
    /// Approximate record count from the source metadata (may be stale)
    pub record_estimate: u64,
    pub mode: CopyMode,
}

/// Derive the target domain name from a source name and optional rename tag.
///
/// ```
/// use simpledb_copy::record::target_domain_name;
///
/// assert_eq!(target_domain_name("orders", None), "orders");
/// assert_eq!(target_domain_name("orders", Some("-copy")), "orders-copy");
/// ```
#[must_use]
pub fn target_domain_name(source: &str, rename_tag: Option<&str>) -> String {
    match rename_tag {
        Some(tag) => format!("{source}{tag}"),
        None => source.to_string(),
    }
}
