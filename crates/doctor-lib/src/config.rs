//! Scan configuration and suspicion policy
//!
//! Every signature set the detectors match against lives here so it can be
//! overridden from a config file or the environment. Defaults reproduce the
//! built-in signatures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::anomaly::ContainerSelection;
use crate::cluster::RetryPolicy;

/// Signatures that mark a pod as suspicious
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspicionPolicy {
    /// Pod phases that are never reported
    pub healthy_phases: Vec<String>,
    /// Waiting reasons that flag a container
    pub waiting_reasons: Vec<String>,
    /// `PodScheduled=False` reasons that flag a pod
    pub unschedulable_reasons: Vec<String>,
    /// Condition types checked for a failing status
    pub readiness_condition_types: Vec<String>,
    /// Condition statuses considered failing for readiness types
    pub failing_condition_statuses: Vec<String>,
    /// Warning event reasons collected by the event checker
    pub warning_event_reasons: Vec<String>,
    /// Which flagged container describes the pod record
    pub container_selection: ContainerSelection,
    /// Also inspect init container statuses
    pub include_init_containers: bool,
}

impl Default for SuspicionPolicy {
    fn default() -> Self {
        Self {
            healthy_phases: strings(&["Running", "Succeeded"]),
            waiting_reasons: strings(&["CrashLoopBackOff", "ImagePullBackOff", "ErrImagePull"]),
            unschedulable_reasons: strings(&["Unschedulable"]),
            readiness_condition_types: strings(&["Ready", "ContainersReady"]),
            failing_condition_statuses: strings(&["False", "Unknown"]),
            warning_event_reasons: strings(&[
                "FailedScheduling",
                "BackOff",
                "FailedMount",
                "Unhealthy",
                "FailedCreatePodSandBox",
                "ErrImagePull",
                "ImagePullBackOff",
            ]),
            container_selection: ContainerSelection::default(),
            include_init_containers: false,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Settings for a full scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub policy: SuspicionPolicy,
    /// Maximum concurrent per-pod event queries
    pub event_concurrency: usize,
    /// Overall scan deadline, no deadline when unset
    pub scan_timeout_secs: Option<u64>,
    /// Attempts per API call, including the first
    pub retry_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            policy: SuspicionPolicy::default(),
            event_concurrency: 8,
            scan_timeout_secs: None,
            retry_attempts: 3,
            retry_initial_backoff_ms: 500,
            retry_max_backoff_ms: 5_000,
        }
    }
}

impl ScanConfig {
    /// Event query concurrency, never below one
    pub fn event_concurrency(&self) -> usize {
        self.event_concurrency.max(1)
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
        }
    }
}
