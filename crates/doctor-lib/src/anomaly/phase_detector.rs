//! Pod phase detection
//!
//! Flags pods whose phase is anything other than a healthy one
//! (Running or Succeeded by default). Pods without a phase count as Unknown.

use k8s_openapi::api::core::v1::Pod;

use super::{contains, identity_or_skip, PodDetector};
use crate::config::SuspicionPolicy;
use crate::models::{pod_phase, DetectionResult, DetectorSource, DiagnosticRecord};

pub const PHASE_SUMMARY: &str = "Pod Phase Issue";
const PHASE_MESSAGE: &str = "Pod is not running or succeeded";

/// Detects pods stuck in a non-healthy phase
pub struct PhaseDetector {
    /// Phases that are never reported
    pub healthy_phases: Vec<String>,
}

impl PhaseDetector {
    pub fn new(healthy_phases: Vec<String>) -> Self {
        Self { healthy_phases }
    }

    pub fn from_policy(policy: &SuspicionPolicy) -> Self {
        Self::new(policy.healthy_phases.clone())
    }

    pub fn is_suspicious(&self, phase: &str) -> bool {
        !contains(&self.healthy_phases, phase)
    }
}

impl Default for PhaseDetector {
    fn default() -> Self {
        Self::from_policy(&SuspicionPolicy::default())
    }
}

impl PodDetector for PhaseDetector {
    fn source(&self) -> DetectorSource {
        DetectorSource::PodPhase
    }

    fn detect(&self, pods: &[Pod]) -> DetectionResult {
        let mut result = DetectionResult::new();

        for pod in pods {
            let phase = pod_phase(pod);
            if !self.is_suspicious(phase) {
                continue;
            }
            let Some(identity) = identity_or_skip(pod, self.source()) else {
                continue;
            };

            let record = DiagnosticRecord::for_pod(pod, self.source(), PHASE_SUMMARY, phase)
                .with_message(PHASE_MESSAGE);
            result.insert(identity, record);
        }

        result
    }
}
