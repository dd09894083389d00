//! Pod diagnostics library
//!
//! This crate provides the core functionality for:
//! - Reading pod and event snapshots from the cluster API
//! - Detecting suspicious phases, container states, conditions and events
//! - Aggregating findings per pod into a scan report
//! - Health tracking and observability

pub mod aggregator;
pub mod anomaly;
pub mod cluster;
pub mod config;
pub mod health;
pub mod models;
pub mod observability;
pub mod scanner;

#[cfg(test)]
mod fixtures;

pub use aggregator::{Aggregator, PodFindings};
pub use cluster::{CallContext, ClusterApi, ClusterError, KubeClusterApi, RetryPolicy};
pub use config::{ScanConfig, SuspicionPolicy};
pub use health::{DetectorHealth, DetectorStatus};
pub use models::*;
pub use observability::{ScanMetrics, StructuredLogger};
pub use scanner::{FetchFailure, ScanReport, Scanner};
