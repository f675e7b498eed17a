// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Target domain provisioning.
//!
//! Creating or deleting a domain is eventually consistent on the remote
//! service, so every mutation is followed by a settle delay before the
//! domain is used.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use super::types::MigrateError;
use crate::resilience::{retry_store_call, RetryConfig};
use crate::store::{DomainStore, StoreOp};

/// Delete/recreate rounds allowed before giving up on a domain that keeps reappearing.
pub const MAX_PRUNE_ROUNDS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// Domain was already there and left untouched
    Existing,
    Created,
    /// Domain was deleted and created again
    Recreated,
}

pub struct Provisioner {
    target: Arc<dyn DomainStore>,
    retry: RetryConfig,
    settle_delay: Duration,
}

impl Provisioner {
    pub fn new(target: Arc<dyn DomainStore>, retry: RetryConfig, settle_delay: Duration) -> Self {
        Self {
            target,
            retry,
            settle_delay,
        }
    }

    /// Make sure `domain` exists on the target, deleting it first when `prune` is set.
    ///
    /// Without `prune`, an existing domain causes no mutating call, so running
    /// this twice is a no-op the second time.
    pub async fn ensure(&self, domain: &str, prune: bool) -> Result<Provisioned, MigrateError> {
        let mut prune_rounds = 0;

        loop {
            let metadata = retry_store_call(StoreOp::DomainMetadata, &self.retry, || {
                self.target.domain_metadata(domain)
            })
            .await;

            match metadata {
                Err(e) if e.is_not_found() => {
                    retry_store_call(StoreOp::CreateDomain, &self.retry, || {
                        self.target.create_domain(domain)
                    })
                    .await
                    .map_err(|e| MigrateError::store(StoreOp::CreateDomain, e))?;
                    info!(domain, settle = ?self.settle_delay, "Created target domain");
                    sleep(self.settle_delay).await;

                    return Ok(if prune_rounds > 0 {
                        Provisioned::Recreated
                    } else {
                        Provisioned::Created
                    });
                }
                Err(e) => return Err(MigrateError::store(StoreOp::DomainMetadata, e)),
                Ok(meta) if prune => {
                    if prune_rounds >= MAX_PRUNE_ROUNDS {
                        return Err(MigrateError::Provisioning {
                            domain: domain.to_string(),
                            reason: format!("still present after {MAX_PRUNE_ROUNDS} deletions"),
                        });
                    }
                    info!(domain, items = meta.item_count, "Deleting target domain before copy");
                    retry_store_call(StoreOp::DeleteDomain, &self.retry, || {
                        self.target.delete_domain(domain)
                    })
                    .await
                    .map_err(|e| MigrateError::store(StoreOp::DeleteDomain, e))?;
                    sleep(self.settle_delay).await;
                    prune_rounds += 1;
                }
                Ok(meta) => {
                    debug!(domain, items = meta.item_count, "Target domain already exists");
                    return Ok(Provisioned::Existing);
                }
            }
        }
    }
}
