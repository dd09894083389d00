//! Observability infrastructure for pod scans
//!
//! Provides:
//! - Prometheus metrics (pods scanned, anomalies by detector, event fetch errors,
//!   scan duration, API call latency)
//! - Structured logging with tracing

use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::models::{DetectorSource, DiagnosticRecord};
use crate::scanner::{FetchFailure, ScanReport};

/// Histogram buckets for API call latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Histogram buckets for whole-scan duration (in seconds)
const SCAN_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ScanMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ScanMetricsInner {
    scans_total: IntCounterVec,
    pods_scanned: IntCounter,
    anomalies_detected: IntCounterVec,
    event_fetch_errors: IntCounter,
    scan_duration_seconds: Histogram,
    api_call_latency_seconds: HistogramVec,
}

impl ScanMetricsInner {
    fn new() -> Self {
        Self {
            scans_total: register_int_counter_vec!(
                "pod_doctor_scans_total",
                "Completed scans by outcome",
                &["outcome"]
            )
            .expect("Failed to register scans_total"),

            pods_scanned: register_int_counter!(
                "pod_doctor_pods_scanned_total",
                "Total number of pod snapshots inspected"
            )
            .expect("Failed to register pods_scanned"),

            anomalies_detected: register_int_counter_vec!(
                "pod_doctor_anomalies_detected_total",
                "Diagnostic records produced, by detector",
                &["source"]
            )
            .expect("Failed to register anomalies_detected"),

            event_fetch_errors: register_int_counter!(
                "pod_doctor_event_fetch_errors_total",
                "Per-pod event queries that failed"
            )
            .expect("Failed to register event_fetch_errors"),

            scan_duration_seconds: register_histogram!(
                "pod_doctor_scan_duration_seconds",
                "Wall time of a full scan",
                SCAN_BUCKETS.to_vec()
            )
            .expect("Failed to register scan_duration_seconds"),

            api_call_latency_seconds: register_histogram_vec!(
                "pod_doctor_api_call_latency_seconds",
                "Latency of individual cluster API calls",
                &["operation"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register api_call_latency_seconds"),
        }
    }
}

/// Scan metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ScanMetrics {
    _private: (),
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScanMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScanMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_scans(&self, outcome: &str) {
        self.inner().scans_total.with_label_values(&[outcome]).inc();
    }

    pub fn add_pods_scanned(&self, count: usize) {
        self.inner().pods_scanned.inc_by(count as u64);
    }

    pub fn add_anomalies(&self, source: DetectorSource, count: usize) {
        self.inner()
            .anomalies_detected
            .with_label_values(&[source.as_str()])
            .inc_by(count as u64);
    }

    pub fn inc_event_fetch_errors(&self) {
        self.inner().event_fetch_errors.inc();
    }

    pub fn observe_scan_duration(&self, duration_secs: f64) {
        self.inner().scan_duration_seconds.observe(duration_secs);
    }

    pub fn observe_api_latency(&self, operation: &str, duration_secs: f64) {
        self.inner()
            .api_call_latency_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for scan events
///
/// Keeps the field names of scan, finding and failure events consistent so
/// JSON logs can be filtered downstream.
#[derive(Clone)]
pub struct StructuredLogger {
    scope: String,
}

impl StructuredLogger {
    /// `namespace` of `None` means the scan covers all namespaces
    pub fn new(namespace: Option<&str>) -> Self {
        Self {
            scope: namespace.unwrap_or("*").to_string(),
        }
    }

    pub fn log_scan_started(&self) {
        info!(event = "scan_started", scope = %self.scope, "Starting pod scan");
    }

    pub fn log_snapshot(&self, pods: usize) {
        debug!(event = "snapshot_listed", scope = %self.scope, pods, "Pod snapshot listed");
    }

    pub fn log_finding(&self, record: &DiagnosticRecord) {
        info!(
            event = "anomaly_detected",
            scope = %self.scope,
            source = %record.source,
            pod_name = %record.pod_name,
            namespace = %record.namespace,
            container = record.container_name.as_deref().unwrap_or_default(),
            reason = %record.reason,
            "{}",
            record.summary
        );
    }

    pub fn log_fetch_failure(&self, failure: &FetchFailure) {
        warn!(
            event = "event_fetch_failed",
            scope = %self.scope,
            pod_name = %failure.pod_name,
            namespace = %failure.namespace,
            pod_uid = %failure.pod,
            error = %failure.error,
            "Skipping pod after event fetch failure"
        );
    }

    pub fn log_scan_completed(&self, report: &ScanReport) {
        if report.is_partial() {
            warn!(
                event = "scan_completed",
                scope = %self.scope,
                pods = report.pods_scanned,
                affected_pods = report.findings.len(),
                records = report.record_count(),
                fetch_failures = report.event_fetch_failures.len(),
                duration_ms = report.duration_ms,
                "Pod scan completed with partial event data"
            );
        } else {
            info!(
                event = "scan_completed",
                scope = %self.scope,
                pods = report.pods_scanned,
                affected_pods = report.findings.len(),
                records = report.record_count(),
                duration_ms = report.duration_ms,
                "Pod scan completed"
            );
        }
    }

    pub fn log_scan_failed(&self, error: &dyn std::error::Error) {
        warn!(
            event = "scan_failed",
            scope = %self.scope,
            error = %error,
            "Pod scan failed"
        );
    }
}
