//! Pod scan command

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use doctor_lib::{
    CallContext, ClusterApi, DetectorSource, DiagnosticRecord, ScanConfig, ScanMetrics, ScanReport,
    Scanner,
};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use super::Outcome;
use crate::output::{
    color_phase, color_source, color_status, format_timestamp, print_info, print_success,
    print_warning, truncate, OutputFormat,
};

const MESSAGE_WIDTH: usize = 60;

/// Row for findings table
#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Since")]
    since: String,
    #[tabled(rename = "Details")]
    details: String,
}

/// Row for per-detector summary table
#[derive(Tabled)]
struct DetectorRow {
    #[tabled(rename = "Detector")]
    detector: String,
    #[tabled(rename = "Findings")]
    findings: usize,
    #[tabled(rename = "Health")]
    health: String,
}

/// Run one scan and print the report
pub async fn run_scan(
    api: Arc<dyn ClusterApi>,
    config: ScanConfig,
    namespace: Option<&str>,
    ctx: &CallContext,
    metrics_file: Option<&Path>,
    format: OutputFormat,
) -> Result<Outcome> {
    let scanner = Scanner::new(api, config);
    let result = scanner.scan(namespace, ctx).await;

    if let Some(path) = metrics_file {
        write_metrics(path)?;
    }

    let report = result.context("Pod scan failed")?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Table => print_report(&report),
    }

    Ok(if report.has_anomalies() {
        Outcome::Anomalies
    } else {
        Outcome::Clean
    })
}

fn print_report(report: &ScanReport) {
    let scope = report.namespace.as_deref().unwrap_or("all namespaces");
    println!("{}", "Pod Scan".bold());
    println!("{}", "=".repeat(60));
    println!("Scope:    {}", scope.cyan());
    println!("Pods:     {}", report.pods_scanned);
    println!("Duration: {}ms", report.duration_ms);
    println!();

    let counts = report.count_by_source();
    let detector_rows: Vec<DetectorRow> = counts
        .iter()
        .map(|(source, findings)| DetectorRow {
            detector: color_source(*source),
            findings: *findings,
            health: report
                .detectors
                .get(source)
                .map(|h| color_status(h.status))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    let table = Table::new(detector_rows).with(Style::rounded()).to_string();
    println!("{}", table);
    println!();

    if report.has_anomalies() {
        let rows: Vec<FindingRow> = report
            .findings
            .iter()
            .flat_map(|pod| pod.records.iter())
            .map(|record| FindingRow {
                namespace: record.namespace.clone(),
                pod: record.pod_name.clone(),
                phase: color_phase(&record.status),
                source: color_source(record.source),
                reason: record.reason.clone(),
                container: record.container_name.clone().unwrap_or_else(|| "-".to_string()),
                since: format_timestamp(record.timestamp),
                details: truncate(&details(record), MESSAGE_WIDTH),
            })
            .collect();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
        println!();
        print_warning(&format!(
            "{} anomalies across {} pods",
            report.record_count(),
            report.findings.len()
        ));
    } else {
        print_success("No anomalies found");
    }

    if report.is_partial() {
        println!();
        print_warning(&format!(
            "Events could not be checked for {} pods:",
            report.event_fetch_failures.len()
        ));
        for failure in &report.event_fetch_failures {
            println!(
                "  {}/{}: {}",
                failure.namespace,
                failure.pod_name,
                failure.error.dimmed()
            );
        }
    }

    for pod in &report.findings {
        if let Some(record) = pod.record(DetectorSource::ContainerStatus) {
            if record.container_findings.len() > 1 {
                print_info(&format!(
                    "{} has {} failing containers",
                    record.pod_ref(),
                    record.container_findings.len()
                ));
            }
        }
    }
}

fn details(record: &DiagnosticRecord) -> String {
    if !record.event_messages.is_empty() {
        return record.event_messages.join("; ");
    }
    if record.message.is_empty() {
        record.summary.clone()
    } else {
        record.message.clone()
    }
}

fn write_metrics(path: &Path) -> Result<()> {
    let text = ScanMetrics::new()
        .render()
        .context("Failed to render metrics")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    info!(path = %path.display(), "Metrics written");
    Ok(())
}
