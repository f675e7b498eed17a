// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Run-scoped accounting and the final report.
//!
//! A [`RunAccumulator`] is owned by the run and lent (`&mut`) to each
//! component in turn. When the run ends, successfully or not, it is frozen
//! into a [`RunReport`] whose quarantine dump lists every record that must be
//! copied by hand.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::record::Record;

/// Records that could not be written, isolated down to a single record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarantineEntry {
    pub domain: String,
    #[serde(rename = "items")]
    pub records: Vec<Record>,
}

/// A domain whose copy was abandoned without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainFailure {
    pub domain: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunAccumulator {
    read_box_usage: f64,
    write_box_usage: f64,
    domains_copied: u64,
    records_copied: u64,
    quarantine: Vec<QuarantineEntry>,
    failed_domains: Vec<DomainFailure>,
    skipped_domains: Vec<String>,
}

impl RunAccumulator {
    pub fn add_read_cost(&mut self, box_usage: f64) {
        self.read_box_usage += box_usage;
        crate::metrics::record_cost_units("read", box_usage);
    }

    pub fn add_write_cost(&mut self, box_usage: f64) {
        self.write_box_usage += box_usage;
        crate::metrics::record_cost_units("write", box_usage);
    }

    pub fn add_records_copied(&mut self, domain: &str, count: usize) {
        self.records_copied += count as u64;
        crate::metrics::record_records_copied(domain, count);
    }

    pub fn domain_copied(&mut self) {
        self.domains_copied += 1;
        crate::metrics::record_domain_outcome("copied");
    }

    pub fn domain_skipped(&mut self, domain: &str) {
        self.skipped_domains.push(domain.to_string());
        crate::metrics::record_domain_outcome("skipped");
    }

    pub fn domain_failed(&mut self, domain: &str, reason: impl Into<String>) {
        self.failed_domains.push(DomainFailure {
            domain: domain.to_string(),
            reason: reason.into(),
        });
        crate::metrics::record_domain_outcome("failed");
    }

    pub fn add_quarantine(&mut self, domain: &str, records: Vec<Record>) {
        crate::metrics::record_quarantined(domain, records.len());
        self.quarantine.push(QuarantineEntry {
            domain: domain.to_string(),
            records,
        });
    }

    #[must_use]
    pub fn read_box_usage(&self) -> f64 {
        self.read_box_usage
    }

    #[must_use]
    pub fn write_box_usage(&self) -> f64 {
        self.write_box_usage
    }

    #[must_use]
    pub fn domains_copied(&self) -> u64 {
        self.domains_copied
    }

    #[must_use]
    pub fn records_copied(&self) -> u64 {
        self.records_copied
    }

    #[must_use]
    pub fn quarantine(&self) -> &[QuarantineEntry] {
        &self.quarantine
    }

    #[must_use]
    pub fn failed_domains(&self) -> &[DomainFailure] {
        &self.failed_domains
    }

    #[must_use]
    pub fn finish(self) -> RunReport {
        RunReport {
            read_box_usage: self.read_box_usage,
            write_box_usage: self.write_box_usage,
            domains_copied: self.domains_copied,
            records_copied: self.records_copied,
            quarantine: self.quarantine,
            failed_domains: self.failed_domains,
            skipped_domains: self.skipped_domains,
        }
    }
}

/// Totals of a finished (or aborted) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub read_box_usage: f64,
    pub write_box_usage: f64,
    pub domains_copied: u64,
    pub records_copied: u64,
    pub quarantine: Vec<QuarantineEntry>,
    pub failed_domains: Vec<DomainFailure>,
    pub skipped_domains: Vec<String>,
}

impl RunReport {
    /// Number of individual records left behind.
    #[must_use]
    pub fn quarantined_records(&self) -> usize {
        self.quarantine.iter().map(|e| e.records.len()).sum()
    }

    /// `{"skippedItems": [{"domain": .., "items": [..]}, ..]}`
    pub fn quarantine_dump(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&json!({ "skippedItems": self.quarantine }))
    }

    /// Log totals, then the quarantine dump if anything was skipped.
    pub fn emit(&self) {
        info!(
            read_box_usage = self.read_box_usage,
            write_box_usage = self.write_box_usage,
            domains_copied = self.domains_copied,
            records_copied = self.records_copied,
            domains_failed = self.failed_domains.len(),
            domains_skipped = self.skipped_domains.len(),
            "Copy run finished"
        );
        for failure in &self.failed_domains {
            warn!(domain = %failure.domain, reason = %failure.reason, "Domain was not copied");
        }
        if self.quarantine.is_empty() {
            return;
        }
        match self.quarantine_dump() {
            Ok(dump) => warn!(
                records = self.quarantined_records(),
                dump = %dump,
                "Records skipped due to write errors, copy them manually"
            ),
            Err(e) => warn!(error = %e, "Failed to serialize quarantine dump"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_totals() {
        let mut acc = RunAccumulator::default();
        acc.add_read_cost(0.5);
        acc.add_read_cost(0.25);
        acc.add_write_cost(1.0);
        acc.add_records_copied("orders", 25);
        acc.add_records_copied("orders", 15);
        acc.domain_copied();

        assert_eq!(acc.read_box_usage(), 0.75);
        assert_eq!(acc.write_box_usage(), 1.0);
        assert_eq!(acc.records_copied(), 40);
        assert_eq!(acc.domains_copied(), 1);

        let report = acc.finish();
        assert_eq!(report.records_copied, 40);
        assert_eq!(report.quarantined_records(), 0);
    }

    #[test]
    fn test_quarantine_dump_shape() {
        let mut acc = RunAccumulator::default();
        acc.add_quarantine("orders", vec![Record::new("o-3").with_attribute("total", "")]);
        acc.add_quarantine("users", vec![Record::new("u-9")]);

        let report = acc.finish();
        let dump: serde_json::Value = serde_json::from_str(&report.quarantine_dump().unwrap()).unwrap();

        let items = dump["skippedItems"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["domain"], "orders");
        assert_eq!(items[0]["items"][0]["name"], "o-3");
        assert_eq!(items[0]["items"][0]["attributes"][0]["name"], "total");
        assert_eq!(items[1]["items"][0]["name"], "u-9");
        assert_eq!(report.quarantined_records(), 2);
    }

    #[test]
    fn test_empty_dump() {
        let report = RunAccumulator::default().finish();
        assert_eq!(report.quarantine_dump().unwrap(), r#"{"skippedItems":[]}"#);
        report.emit();
    }

    #[test]
    fn test_failed_and_skipped_domains() {
        let mut acc = RunAccumulator::default();
        acc.domain_skipped("auth");
        acc.domain_failed("events", "bad timestamp");

        assert_eq!(acc.failed_domains()[0].domain, "events");
        let report = acc.finish();
        assert_eq!(report.skipped_domains, vec!["auth".to_string()]);
        assert_eq!(report.failed_domains[0].reason, "bad timestamp");
        report.emit();
    }
}
