//! Scan driver
//!
//! Lists pods once, runs every detector over that single snapshot, fetches
//! events for the event checker, and merges all records into a report.

mod events;

#[cfg(test)]
mod tests;

pub use events::{EventFetchOutcome, EventFetcher, FetchFailure};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::aggregator::{Aggregator, PodFindings};
use crate::anomaly::{pod_detectors, EventDetector};
use crate::cluster::{CallContext, ClusterApi, ClusterError};
use crate::config::ScanConfig;
use crate::health::{overall_status, DetectorHealth, DetectorHealthMap, DetectorStatus};
use crate::models::{DetectionResult, DetectorSource};
use crate::observability::{ScanMetrics, StructuredLogger};

/// Result of one scan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Scanned namespace, `None` for all namespaces
    pub namespace: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub pods_scanned: usize,
    pub findings: Vec<PodFindings>,
    pub detectors: DetectorHealthMap,
    pub event_fetch_failures: Vec<FetchFailure>,
}

impl ScanReport {
    pub fn has_anomalies(&self) -> bool {
        !self.findings.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.findings.iter().map(|f| f.records.len()).sum()
    }

    pub fn count_by_source(&self) -> BTreeMap<DetectorSource, usize> {
        let mut counts: BTreeMap<DetectorSource, usize> =
            DetectorSource::ALL.iter().map(|s| (*s, 0)).collect();
        for source in self.findings.iter().flat_map(|f| f.sources()) {
            *counts.entry(source).or_default() += 1;
        }
        counts
    }

    /// Some pods could not be checked for events
    pub fn is_partial(&self) -> bool {
        !self.event_fetch_failures.is_empty()
    }

    pub fn status(&self) -> DetectorStatus {
        overall_status(&self.detectors)
    }
}

struct ScanOutput {
    pods_scanned: usize,
    findings: Vec<PodFindings>,
    detectors: DetectorHealthMap,
    failures: Vec<FetchFailure>,
}

pub struct Scanner {
    api: Arc<dyn ClusterApi>,
    config: ScanConfig,
    metrics: ScanMetrics,
}

impl Scanner {
    pub fn new(api: Arc<dyn ClusterApi>, config: ScanConfig) -> Self {
        Self {
            api,
            config,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan one namespace, or all namespaces when `None`.
    ///
    /// Fails when the pod listing fails or the context is cancelled or
    /// expires. Per-pod event failures only make the report partial.
    pub async fn scan(
        &self,
        namespace: Option<&str>,
        ctx: &CallContext,
    ) -> Result<ScanReport, ClusterError> {
        let ctx = self.scan_context(ctx);
        let logger = StructuredLogger::new(namespace);
        let started_at = Utc::now();
        let timer = Instant::now();

        logger.log_scan_started();
        let result = self.run(namespace, &ctx, &logger).await;
        let elapsed = timer.elapsed();
        self.metrics.observe_scan_duration(elapsed.as_secs_f64());

        match result {
            Ok(output) => {
                let report = ScanReport {
                    namespace: namespace.map(str::to_string),
                    started_at,
                    duration_ms: elapsed.as_millis() as u64,
                    pods_scanned: output.pods_scanned,
                    findings: output.findings,
                    detectors: output.detectors,
                    event_fetch_failures: output.failures,
                };
                self.metrics.inc_scans(if report.has_anomalies() {
                    "anomalies"
                } else {
                    "clean"
                });
                logger.log_scan_completed(&report);
                Ok(report)
            }
            Err(err) => {
                self.metrics.inc_scans("failed");
                logger.log_scan_failed(&err);
                Err(err)
            }
        }
    }

    /// Caller context, tightened by the configured scan timeout
    fn scan_context(&self, ctx: &CallContext) -> CallContext {
        let Some(timeout) = self.config.scan_timeout() else {
            return ctx.clone();
        };
        let deadline = Instant::now() + timeout;
        match ctx.deadline() {
            Some(existing) if existing <= deadline => ctx.clone(),
            _ => ctx.clone().with_deadline(deadline),
        }
    }

    async fn run(
        &self,
        namespace: Option<&str>,
        ctx: &CallContext,
        logger: &StructuredLogger,
    ) -> Result<ScanOutput, ClusterError> {
        let pods = self.api.list_pods(namespace, ctx).await?;
        logger.log_snapshot(pods.len());
        self.metrics.add_pods_scanned(pods.len());

        let mut aggregator = Aggregator::new();
        let mut detectors = DetectorHealthMap::new();

        for detector in pod_detectors(&self.config.policy) {
            let result = detector.detect(&pods);
            self.absorb(detector.source(), result, &mut aggregator, logger);
            detectors.insert(detector.source(), DetectorHealth::healthy());
        }

        let fetched = EventFetcher::new(Arc::clone(&self.api), self.config.event_concurrency())
            .fetch(namespace, &pods, ctx)
            .await?;
        for failure in &fetched.failures {
            logger.log_fetch_failure(failure);
        }

        let event_detector = EventDetector::from_policy(&self.config.policy);
        let result = event_detector.detect(&pods, &fetched.events);
        self.absorb(event_detector.source(), result, &mut aggregator, logger);
        detectors.insert(event_detector.source(), event_health(&fetched));

        Ok(ScanOutput {
            pods_scanned: pods.len(),
            findings: aggregator.finish(),
            detectors,
            failures: fetched.failures,
        })
    }

    fn absorb(
        &self,
        source: DetectorSource,
        result: DetectionResult,
        aggregator: &mut Aggregator,
        logger: &StructuredLogger,
    ) {
        self.metrics.add_anomalies(source, result.len());
        for record in result.values() {
            logger.log_finding(record);
        }
        aggregator.merge(result);
    }
}

fn event_health(fetched: &EventFetchOutcome) -> DetectorHealth {
    let failed = fetched.failures.len();
    if failed == 0 {
        DetectorHealth::healthy()
    } else if failed == fetched.attempted {
        DetectorHealth::unhealthy(format!("all {failed} event queries failed"))
    } else {
        DetectorHealth::degraded(format!(
            "{failed} of {} event queries failed",
            fetched.attempted
        ))
    }
}
