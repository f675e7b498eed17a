// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for a copy run.
//!
//! # Example
//!
//! ```
//! use simpledb_copy::CopyConfig;
//!
//! // Minimal config (uses defaults)
//! let config = CopyConfig::default();
//! assert_eq!(config.select_page_size, 25);
//! assert!(config.validate().is_ok());
//!
//! // Same-region copy needs a rename tag
//! let config = CopyConfig {
//!     target_region: "us-east-1".into(),
//!     rename_tag: Some("-backup".into()),
//!     exclude_domains: ["sessions".to_string()].into(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use crate::record::{target_domain_name, CopyMode};
use crate::resilience::RetryConfig;

/// Largest page a select may ask for.
pub const MAX_SELECT_PAGE_SIZE: usize = 2500;

/// Configuration for a copy run.
///
/// Credentials live with the store clients; everything else is here.
#[derive(Debug, Clone, Deserialize)]
pub struct CopyConfig {
    /// Region the source client reads from
    #[serde(default = "default_source_region")]
    pub source_region: String,

    /// Region the target client writes to
    #[serde(default = "default_target_region")]
    pub target_region: String,

    /// Appended to every source domain name to form the target name
    #[serde(default)]
    pub rename_tag: Option<String>,

    /// Allow-list of source domains (empty = all)
    #[serde(default)]
    pub include_domains: HashSet<String>,

    /// Source domains never copied
    #[serde(default)]
    pub exclude_domains: HashSet<String>,

    /// Domains copied incrementally (only records newer than `reference_timestamp`)
    #[serde(default)]
    pub incremental_domains: HashSet<String>,

    /// RFC 3339 instant for incremental domains
    #[serde(default)]
    pub reference_timestamp: Option<String>,

    /// Attribute holding each record's modification time
    #[serde(default = "default_timestamp_attribute")]
    pub timestamp_attribute: String,

    /// Delete and recreate existing target domains before copying (full mode only)
    #[serde(default)]
    pub prune_before_copy: bool,

    /// Records per select page; small pages bound the damage of one failed write
    #[serde(default = "default_select_page_size")]
    pub select_page_size: usize,

    #[serde(default)]
    pub consistent_read: bool,

    /// Wait after creating or deleting a target domain
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Wait before writing the halves of a rejected batch
    #[serde(default = "default_conflict_cooldown_ms")]
    pub conflict_cooldown_ms: u64,

    /// Retry policy for every remote call
    #[serde(default = "default_retry_max_tries")]
    pub retry_max_tries: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_source_region() -> String { "us-east-1".to_string() }
fn default_target_region() -> String { "us-west-2".to_string() }
fn default_timestamp_attribute() -> String { "updatedAt".to_string() }
fn default_select_page_size() -> usize { 25 }
fn default_settle_delay_ms() -> u64 { 10_000 }
fn default_conflict_cooldown_ms() -> u64 { 5_000 }
fn default_retry_max_tries() -> u32 { 5 }
fn default_retry_initial_delay_ms() -> u64 { 200 }
fn default_retry_max_delay_ms() -> u64 { 60_000 }

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            source_region: default_source_region(),
            target_region: default_target_region(),
            rename_tag: None,
            include_domains: HashSet::new(),
            exclude_domains: HashSet::new(),
            incremental_domains: HashSet::new(),
            reference_timestamp: None,
            timestamp_attribute: default_timestamp_attribute(),
            prune_before_copy: false,
            select_page_size: default_select_page_size(),
            consistent_read: false,
            settle_delay_ms: default_settle_delay_ms(),
            conflict_cooldown_ms: default_conflict_cooldown_ms(),
            retry_max_tries: default_retry_max_tries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Why a config cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("source and target are both in {0}: a rename tag is required")]
    SameRegionWithoutRename(String),
    #[error("rename tag must not be empty")]
    EmptyRenameTag,
    #[error("select page size must be between 1 and {max}, got {got}")]
    PageSize { got: usize, max: usize },
}

impl CopyConfig {
    /// Reject settings that would copy a domain onto itself or issue invalid selects.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.rename_tag.as_deref(), Some("")) {
            return Err(ConfigError::EmptyRenameTag);
        }
        if self.source_region == self.target_region && self.rename_tag.is_none() {
            return Err(ConfigError::SameRegionWithoutRename(self.source_region.clone()));
        }
        if self.select_page_size == 0 || self.select_page_size > MAX_SELECT_PAGE_SIZE {
            return Err(ConfigError::PageSize {
                got: self.select_page_size,
                max: MAX_SELECT_PAGE_SIZE,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_tries: self.retry_max_tries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            factor: 2.0,
        }
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn conflict_cooldown(&self) -> Duration {
        Duration::from_millis(self.conflict_cooldown_ms)
    }

    #[must_use]
    pub fn target_name(&self, source: &str) -> String {
        target_domain_name(source, self.rename_tag.as_deref())
    }

    #[must_use]
    pub fn mode_for(&self, domain: &str) -> CopyMode {
        if self.incremental_domains.contains(domain) {
            CopyMode::Incremental
        } else {
            CopyMode::Full
        }
    }
}
