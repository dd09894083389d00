//! Container status detection
//!
//! Inspects every container status of every pod. A container is flagged when
//! it waits with a crash/image-pull reason, or when it terminated with a
//! non-zero exit code. Running containers and containers without any state
//! are never flagged.

use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{contains, identity_or_skip, PodDetector};
use crate::config::SuspicionPolicy;
use crate::models::{ContainerFinding, DetectionResult, DetectorSource, DiagnosticRecord};

pub const CONTAINER_SUMMARY: &str = "Container Status Issue";

/// Reason used when a failed termination carries no reason of its own
const TERMINATED_FALLBACK_REASON: &str = "Terminated";

/// Which flagged container becomes the primary subject of the pod record
///
/// All flagged containers are listed in `container_findings` regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerSelection {
    /// First flagged container in status order
    First,
    /// Last flagged container in status order
    #[default]
    Last,
}

/// Detects crashing, backing-off and failed containers
pub struct ContainerStatusDetector {
    /// Waiting reasons that flag a container
    pub waiting_reasons: Vec<String>,
    pub selection: ContainerSelection,
    /// Inspect init containers before regular containers
    pub include_init_containers: bool,
}

impl ContainerStatusDetector {
    pub fn new(waiting_reasons: Vec<String>) -> Self {
        Self {
            waiting_reasons,
            selection: ContainerSelection::default(),
            include_init_containers: false,
        }
    }

    pub fn from_policy(policy: &SuspicionPolicy) -> Self {
        Self::new(policy.waiting_reasons.clone())
            .with_selection(policy.container_selection)
            .with_init_containers(policy.include_init_containers)
    }

    pub fn with_selection(mut self, selection: ContainerSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_init_containers(mut self, include: bool) -> Self {
        self.include_init_containers = include;
        self
    }

    /// Classify a single container status
    pub fn classify(&self, status: &ContainerStatus) -> Option<ContainerFinding> {
        let state = status.state.as_ref()?;

        if let Some(waiting) = &state.waiting {
            let reason = waiting.reason.as_deref().unwrap_or_default();
            if !contains(&self.waiting_reasons, reason) {
                return None;
            }
            return Some(ContainerFinding {
                container_name: status.name.clone(),
                reason: reason.to_string(),
                message: waiting.message.clone().unwrap_or_default(),
                exit_code: None,
                state: state.clone(),
            });
        }

        if let Some(terminated) = &state.terminated {
            if terminated.exit_code == 0 {
                return None;
            }
            let reason = terminated
                .reason
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or(TERMINATED_FALLBACK_REASON);
            return Some(ContainerFinding {
                container_name: status.name.clone(),
                reason: reason.to_string(),
                message: terminated.message.clone().unwrap_or_default(),
                exit_code: Some(terminated.exit_code),
                state: state.clone(),
            });
        }

        None
    }

    fn statuses<'a>(&self, pod: &'a Pod) -> impl Iterator<Item = &'a ContainerStatus> {
        let status = pod.status.as_ref();
        let init = status
            .filter(|_| self.include_init_containers)
            .and_then(|s| s.init_container_statuses.as_deref())
            .unwrap_or_default();
        let regular = status
            .and_then(|s| s.container_statuses.as_deref())
            .unwrap_or_default();
        init.iter().chain(regular.iter())
    }
}

impl Default for ContainerStatusDetector {
    fn default() -> Self {
        Self::from_policy(&SuspicionPolicy::default())
    }
}

impl PodDetector for ContainerStatusDetector {
    fn source(&self) -> DetectorSource {
        DetectorSource::ContainerStatus
    }

    fn detect(&self, pods: &[Pod]) -> DetectionResult {
        let mut result = DetectionResult::new();

        for pod in pods {
            let findings: Vec<ContainerFinding> = self
                .statuses(pod)
                .filter_map(|status| self.classify(status))
                .collect();

            let primary = match self.selection {
                ContainerSelection::First => findings.first(),
                ContainerSelection::Last => findings.last(),
            };
            let Some(primary) = primary else {
                continue;
            };
            let Some(identity) = identity_or_skip(pod, self.source()) else {
                continue;
            };

            if findings.len() > 1 {
                debug!(
                    pod_uid = %identity,
                    flagged = findings.len(),
                    selected = %primary.container_name,
                    "Multiple containers flagged on one pod"
                );
            }

            let record =
                DiagnosticRecord::for_pod(pod, self.source(), CONTAINER_SUMMARY, &primary.reason)
                    .with_message(&primary.message)
                    .with_container(primary)
                    .with_container_findings(findings.clone());
            result.insert(identity, record);
        }

        result
    }
}
