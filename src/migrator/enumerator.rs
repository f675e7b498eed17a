// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Domain listing, filtering and target naming.
//!
//! The listing is walked one domain per page and interleaved with copying:
//! [`DomainEnumerator::next_domain`] returns the next domain to copy and the
//! caller finishes that copy before asking again.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::types::MigrateError;
use crate::config::CopyConfig;
use crate::record::DomainDescriptor;
use crate::report::RunAccumulator;
use crate::resilience::{retry_store_call, RetryConfig};
use crate::store::{DomainStore, StoreOp};

pub struct DomainEnumerator {
    source: Arc<dyn DomainStore>,
    retry: RetryConfig,
    config: CopyConfig,
    next_token: Option<String>,
    exhausted: bool,
    processed: HashSet<String>,
    /// Names rejected by filters, remembered so a cycling cursor still halts
    skipped: HashSet<String>,
}

impl DomainEnumerator {
    pub fn new(source: Arc<dyn DomainStore>, retry: RetryConfig, config: &CopyConfig) -> Self {
        Self {
            source,
            retry,
            config: config.clone(),
            next_token: None,
            exhausted: false,
            processed: HashSet::new(),
            skipped: HashSet::new(),
        }
    }

    /// Domains handed out so far (plus those dropped after filtering).
    #[must_use]
    pub fn processed(&self) -> &HashSet<String> {
        &self.processed
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetch listing pages until a copyable domain turns up or the listing ends.
    pub async fn next_domain(
        &mut self,
        acc: &mut RunAccumulator,
    ) -> Result<Option<DomainDescriptor>, MigrateError> {
        loop {
            if self.exhausted {
                return Ok(None);
            }

            let token = self.next_token.take();
            let page = retry_store_call(StoreOp::ListDomains, &self.retry, || {
                self.source.list_domains(token.as_deref())
            })
            .await
            .map_err(|e| MigrateError::store(StoreOp::ListDomains, e))?;
            acc.add_read_cost(page.box_usage);

            self.next_token = page.next_token;
            if self.next_token.is_none() {
                self.exhausted = true;
            }

            let Some(name) = page.domain_name else {
                self.exhausted = true;
                return Ok(None);
            };

            if self.processed.contains(&name) || self.skipped.contains(&name) {
                warn!(domain = %name, "Listing returned a domain already seen, stopping enumeration");
                self.exhausted = true;
                return Ok(None);
            }

            if self.config.exclude_domains.contains(&name) {
                info!(domain = %name, "Skipping excluded domain");
                self.skip(&name, acc);
                continue;
            }

            let include = &self.config.include_domains;
            if !include.is_empty() && !include.contains(&name) {
                info!(domain = %name, "Skipping domain not in include list");
                self.skip(&name, acc);
                continue;
            }

            self.processed.insert(name.clone());

            let target_name = self.config.target_name(&name);
            if self.config.rename_tag.is_some() && target_name == name {
                warn!(domain = %name, "Rename leaves the target name unchanged, skipping to avoid copying onto itself");
                acc.domain_skipped(&name);
                continue;
            }

            let metadata = retry_store_call(StoreOp::DomainMetadata, &self.retry, || {
                self.source.domain_metadata(&name)
            })
            .await;
            let record_estimate = match metadata {
                Ok(meta) => meta.item_count,
                Err(e) if e.is_not_found() => {
                    warn!(domain = %name, "Source domain disappeared after listing, skipping");
                    acc.domain_skipped(&name);
                    continue;
                }
                Err(e) => return Err(MigrateError::store(StoreOp::DomainMetadata, e)),
            };

            return Ok(Some(DomainDescriptor {
                mode: self.config.mode_for(&name),
                name,
                target_name,
                record_estimate,
            }));
        }
    }

    fn skip(&mut self, name: &str, acc: &mut RunAccumulator) {
        self.skipped.insert(name.to_string());
        acc.domain_skipped(name);
    }
}
