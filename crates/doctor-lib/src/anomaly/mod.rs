//! Anomaly detection for pod runtime signals
//!
//! This module provides detection for:
//! - Pods stuck outside the Running/Succeeded phases
//! - Containers in crash/backoff or failed-termination states
//! - Failing scheduling and readiness conditions
//! - Suspicious warning events recorded against a pod

mod condition_detector;
mod container_detector;
mod event_detector;
mod phase_detector;

pub use condition_detector::{ConditionDetector, CONDITION_SUMMARY};
pub use container_detector::{ContainerSelection, ContainerStatusDetector, CONTAINER_SUMMARY};
pub use event_detector::{EventDetector, EventsByPod, EVENT_SUMMARY};
pub use phase_detector::{PhaseDetector, PHASE_SUMMARY};

use k8s_openapi::api::core::v1::Pod;
use tracing::warn;

use crate::config::SuspicionPolicy;
use crate::models::{DetectionResult, DetectorSource, PodIdentity};

/// Detector working on the pod snapshot alone
pub trait PodDetector: Send + Sync {
    /// Tag written into every record this detector produces
    fn source(&self) -> DetectorSource;

    /// Single read-only pass over the snapshot
    fn detect(&self, pods: &[Pod]) -> DetectionResult;
}

/// Snapshot detectors configured from a policy, in report order
pub fn pod_detectors(policy: &SuspicionPolicy) -> Vec<Box<dyn PodDetector>> {
    vec![
        Box::new(PhaseDetector::from_policy(policy)),
        Box::new(ContainerStatusDetector::from_policy(policy)),
        Box::new(ConditionDetector::from_policy(policy)),
    ]
}

/// Identity of a pod, logging and skipping snapshots without a uid
fn identity_or_skip(pod: &Pod, source: DetectorSource) -> Option<PodIdentity> {
    let identity = PodIdentity::of(pod);
    if identity.is_none() {
        warn!(
            source = %source,
            pod_name = pod.metadata.name.as_deref().unwrap_or_default(),
            namespace = pod.metadata.namespace.as_deref().unwrap_or_default(),
            "Skipping pod without uid"
        );
    }
    identity
}

fn contains(values: &[String], candidate: &str) -> bool {
    values.iter().any(|v| v == candidate)
}
