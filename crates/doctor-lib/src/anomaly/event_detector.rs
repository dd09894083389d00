//! Warning event detection
//!
//! Works on events already fetched per pod (see `scanner::EventFetcher`).
//! A pod is reported once, listing every Warning event whose reason is in
//! the suspicious set, in the order the cluster returned them.

use std::collections::HashMap;

use k8s_openapi::api::core::v1::{Event, Pod};

use super::{contains, identity_or_skip};
use crate::config::SuspicionPolicy;
use crate::models::{DetectionResult, DetectorSource, DiagnosticRecord, PodIdentity};

pub const EVENT_SUMMARY: &str = "Warning Events Found";
const EVENT_REASON: &str = "EventType: Warning";
const EVENT_MESSAGE: &str = "Pod has one or more warning-level events";
const WARNING_TYPE: &str = "Warning";

/// Events grouped by the pod they involve
pub type EventsByPod = HashMap<PodIdentity, Vec<Event>>;

/// Detects pods with suspicious warning events
pub struct EventDetector {
    /// Warning reasons worth reporting
    pub suspicious_reasons: Vec<String>,
}

impl EventDetector {
    pub fn new(suspicious_reasons: Vec<String>) -> Self {
        Self { suspicious_reasons }
    }

    pub fn from_policy(policy: &SuspicionPolicy) -> Self {
        Self::new(policy.warning_event_reasons.clone())
    }

    pub fn source(&self) -> DetectorSource {
        DetectorSource::EventChecker
    }

    pub fn is_suspicious(&self, event: &Event) -> bool {
        event.type_.as_deref() == Some(WARNING_TYPE)
            && event
                .reason
                .as_deref()
                .is_some_and(|reason| contains(&self.suspicious_reasons, reason))
    }

    /// `<reason>: <message>` line for a report
    pub fn describe(event: &Event) -> String {
        format!(
            "{}: {}",
            event.reason.as_deref().unwrap_or_default(),
            event.message.as_deref().unwrap_or_default()
        )
    }

    /// Single pass over the snapshot and its events.
    ///
    /// Pods missing from `events` (no events, or the fetch failed) are not
    /// reported. Events involving a different uid are ignored.
    pub fn detect(&self, pods: &[Pod], events: &EventsByPod) -> DetectionResult {
        let mut result = DetectionResult::new();

        for pod in pods {
            let Some(identity) = identity_or_skip(pod, self.source()) else {
                continue;
            };
            let Some(pod_events) = events.get(&identity) else {
                continue;
            };

            let warnings: Vec<String> = pod_events
                .iter()
                .filter(|event| involves(event, &identity))
                .filter(|event| self.is_suspicious(event))
                .map(Self::describe)
                .collect();
            if warnings.is_empty() {
                continue;
            }

            let record = DiagnosticRecord::for_pod(pod, self.source(), EVENT_SUMMARY, EVENT_REASON)
                .with_message(EVENT_MESSAGE)
                .with_event_messages(warnings);
            result.insert(identity, record);
        }

        result
    }
}

impl Default for EventDetector {
    fn default() -> Self {
        Self::from_policy(&SuspicionPolicy::default())
    }
}

fn involves(event: &Event, identity: &PodIdentity) -> bool {
    event
        .involved_object
        .uid
        .as_deref()
        .map_or(true, |uid| uid == identity.as_str())
}
