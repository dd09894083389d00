//! Pod condition detection
//!
//! Flags pods that cannot be scheduled, or whose readiness conditions
//! report False/Unknown. Only the first matching condition of a pod is
//! recorded.

use k8s_openapi::api::core::v1::{Pod, PodCondition};

use super::{contains, identity_or_skip, PodDetector};
use crate::config::SuspicionPolicy;
use crate::models::{DetectionResult, DetectorSource, DiagnosticRecord};

pub const CONDITION_SUMMARY: &str = "Pod Condition Issue";

const SCHEDULED_CONDITION: &str = "PodScheduled";
const STATUS_FALSE: &str = "False";

/// Detects unschedulable and not-ready pods
pub struct ConditionDetector {
    /// `PodScheduled=False` reasons that count as unschedulable
    pub unschedulable_reasons: Vec<String>,
    /// Condition types checked for a failing status
    pub readiness_types: Vec<String>,
    /// Statuses that count as failing for readiness types
    pub failing_statuses: Vec<String>,
}

impl ConditionDetector {
    pub fn new(
        unschedulable_reasons: Vec<String>,
        readiness_types: Vec<String>,
        failing_statuses: Vec<String>,
    ) -> Self {
        Self {
            unschedulable_reasons,
            readiness_types,
            failing_statuses,
        }
    }

    pub fn from_policy(policy: &SuspicionPolicy) -> Self {
        Self::new(
            policy.unschedulable_reasons.clone(),
            policy.readiness_condition_types.clone(),
            policy.failing_condition_statuses.clone(),
        )
    }

    /// Whether a condition matches a suspicious signature
    pub fn matches(&self, condition: &PodCondition) -> bool {
        let unschedulable = condition.type_ == SCHEDULED_CONDITION
            && condition.status == STATUS_FALSE
            && condition
                .reason
                .as_deref()
                .is_some_and(|reason| contains(&self.unschedulable_reasons, reason));

        let not_ready = contains(&self.readiness_types, &condition.type_)
            && contains(&self.failing_statuses, &condition.status);

        unschedulable || not_ready
    }
}

impl Default for ConditionDetector {
    fn default() -> Self {
        Self::from_policy(&SuspicionPolicy::default())
    }
}

impl PodDetector for ConditionDetector {
    fn source(&self) -> DetectorSource {
        DetectorSource::PodCondition
    }

    fn detect(&self, pods: &[Pod]) -> DetectionResult {
        let mut result = DetectionResult::new();

        for pod in pods {
            let conditions = pod
                .status
                .as_ref()
                .and_then(|s| s.conditions.as_deref())
                .unwrap_or_default();

            // First match wins
            let Some(condition) = conditions.iter().find(|c| self.matches(c)) else {
                continue;
            };
            let Some(identity) = identity_or_skip(pod, self.source()) else {
                continue;
            };

            let record = DiagnosticRecord::for_pod(
                pod,
                self.source(),
                CONDITION_SUMMARY,
                condition.reason.clone().unwrap_or_default(),
            )
            .with_message(condition.message.clone().unwrap_or_default())
            .with_timestamp(condition.last_transition_time.as_ref().map(|t| t.0));
            result.insert(identity, record);
        }

        result
    }
}
