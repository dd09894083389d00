//! Core data models for pod diagnostics

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerState, Pod, PodCondition};
use serde::{Deserialize, Serialize};

/// Phase reported for pods whose status carries no phase yet
pub const UNKNOWN_PHASE: &str = "Unknown";

/// Cluster-assigned unique identifier of a pod.
///
/// Name and namespace can repeat when a pod is recreated, so records are
/// always keyed by the uid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PodIdentity(String);

impl PodIdentity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Identity of a pod snapshot, `None` when the cluster assigned no uid
    pub fn of(pod: &Pod) -> Option<Self> {
        pod.metadata
            .uid
            .as_deref()
            .filter(|uid| !uid.is_empty())
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detector that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DetectorSource {
    PodPhase,
    ContainerStatus,
    PodCondition,
    EventChecker,
}

impl DetectorSource {
    /// All sources in report order
    pub const ALL: [DetectorSource; 4] = [
        DetectorSource::PodPhase,
        DetectorSource::ContainerStatus,
        DetectorSource::PodCondition,
        DetectorSource::EventChecker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorSource::PodPhase => "PodPhase",
            DetectorSource::ContainerStatus => "ContainerStatus",
            DetectorSource::PodCondition => "PodCondition",
            DetectorSource::EventChecker => "EventChecker",
        }
    }
}

impl fmt::Display for DetectorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single flagged container within a pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerFinding {
    pub container_name: String,
    pub reason: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub state: ContainerState,
}

/// One detected anomaly for one pod
///
/// Every pod-level field is copied from the same pod snapshot by
/// [`DiagnosticRecord::for_pod`]; detectors only add their own details on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    /// One-liner describing the issue, always populated
    pub summary: String,
    /// Machine-facing signal (phase, waiting reason, condition reason, ...)
    pub reason: String,
    /// Longer explanation, may be empty
    pub message: String,
    pub pod_name: String,
    pub namespace: String,
    /// Set for container-level issues only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Best-effort time of the most recent observed issue
    pub timestamp: Option<DateTime<Utc>>,
    /// Pod phase at observation time
    pub status: String,
    /// Every pod condition at detection time
    pub conditions: Vec<PodCondition>,
    /// Warning event descriptions, event checker only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_state: Option<ContainerState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Every flagged container of the pod in iteration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_findings: Vec<ContainerFinding>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub source: DetectorSource,
}

impl DiagnosticRecord {
    /// Start a record from a pod snapshot.
    ///
    /// The timestamp defaults to the pod start time.
    pub fn for_pod(
        pod: &Pod,
        source: DetectorSource,
        summary: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let status = pod.status.as_ref();

        Self {
            summary: summary.into(),
            reason: reason.into(),
            message: String::new(),
            pod_name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            container_name: None,
            timestamp: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
            status: pod_phase(pod).to_string(),
            conditions: status
                .and_then(|s| s.conditions.clone())
                .unwrap_or_default(),
            event_messages: Vec::new(),
            container_state: None,
            exit_code: None,
            container_findings: Vec::new(),
            labels: pod.metadata.labels.clone().unwrap_or_default(),
            annotations: pod.metadata.annotations.clone().unwrap_or_default(),
            source,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach the triggering container
    pub fn with_container(mut self, finding: &ContainerFinding) -> Self {
        self.container_name = Some(finding.container_name.clone());
        self.container_state = Some(finding.state.clone());
        self.exit_code = finding.exit_code;
        self
    }

    pub fn with_container_findings(mut self, findings: Vec<ContainerFinding>) -> Self {
        self.container_findings = findings;
        self
    }

    pub fn with_event_messages(mut self, messages: Vec<String>) -> Self {
        self.event_messages = messages;
        self
    }

    /// `namespace/name` of the pod
    pub fn pod_ref(&self) -> String {
        format!("{}/{}", self.namespace, self.pod_name)
    }
}

/// Records produced by one detector pass, at most one per pod
pub type DetectionResult = BTreeMap<PodIdentity, DiagnosticRecord>;

/// Phase of a pod, `Unknown` when the status has none
pub fn pod_phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or(UNKNOWN_PHASE)
}
