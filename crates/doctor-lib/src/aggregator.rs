//! Merges detector passes into one result set per pod
//!
//! Each pod holds at most one record per detector source. A second record for
//! an occupied slot is dropped, so merge order never changes the outcome.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::models::{DetectionResult, DetectorSource, DiagnosticRecord, PodIdentity};

/// Every record found for one pod, ordered by detector source
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodFindings {
    pub identity: PodIdentity,
    pub pod_name: String,
    pub namespace: String,
    pub records: Vec<DiagnosticRecord>,
}

impl PodFindings {
    fn new(identity: PodIdentity, first: &DiagnosticRecord) -> Self {
        Self {
            identity,
            pod_name: first.pod_name.clone(),
            namespace: first.namespace.clone(),
            records: Vec::with_capacity(DetectorSource::ALL.len()),
        }
    }

    /// Record produced by the given detector, if any
    pub fn record(&self, source: DetectorSource) -> Option<&DiagnosticRecord> {
        self.slot(source).ok().map(|idx| &self.records[idx])
    }

    pub fn sources(&self) -> impl Iterator<Item = DetectorSource> + '_ {
        self.records.iter().map(|r| r.source)
    }

    fn slot(&self, source: DetectorSource) -> Result<usize, usize> {
        self.records.binary_search_by(|r| r.source.cmp(&source))
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    pods: HashMap<PodIdentity, PodFindings>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one detector pass, returning how many records were added
    pub fn merge(&mut self, result: DetectionResult) -> usize {
        let mut added = 0;

        for (identity, record) in result {
            let findings = self
                .pods
                .entry(identity.clone())
                .or_insert_with(|| PodFindings::new(identity, &record));

            match findings.slot(record.source) {
                Ok(_) => {
                    warn!(
                        source = %record.source,
                        pod_name = %record.pod_name,
                        namespace = %record.namespace,
                        "Duplicate record for detector slot, keeping the first"
                    );
                }
                Err(idx) => {
                    findings.records.insert(idx, record);
                    added += 1;
                }
            }
        }

        added
    }

    /// Number of pods with at least one record
    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.pods.values().map(|f| f.records.len()).sum()
    }

    pub fn get(&self, identity: &PodIdentity) -> Option<&PodFindings> {
        self.pods.get(identity)
    }

    /// Findings ordered by namespace, pod name, then uid
    pub fn finish(self) -> Vec<PodFindings> {
        let mut findings: Vec<PodFindings> = self.pods.into_values().collect();
        findings.sort_by(|a, b| {
            (&a.namespace, &a.pod_name, &a.identity).cmp(&(&b.namespace, &b.pod_name, &b.identity))
        });
        findings
    }
}
