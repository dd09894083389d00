//! Per-detector health for a scan
//!
//! A detector is healthy when it ran over complete input, degraded when it
//! ran over partial input (some event queries failed), and unhealthy when
//! it produced nothing because its input was unavailable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::DetectorSource;

/// Health status of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorStatus {
    Healthy,
    /// Ran, but over incomplete input
    Degraded,
    Unhealthy,
}

impl DetectorStatus {
    /// Returns true if the detector produced results at all
    pub fn is_operational(&self) -> bool {
        matches!(self, DetectorStatus::Healthy | DetectorStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorHealth {
    pub status: DetectorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl DetectorHealth {
    pub fn healthy() -> Self {
        Self {
            status: DetectorStatus::Healthy,
            message: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: DetectorStatus::Degraded,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: DetectorStatus::Unhealthy,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Health of each detector that took part in a scan
pub type DetectorHealthMap = BTreeMap<DetectorSource, DetectorHealth>;

/// Compute the overall status from detector statuses.
///
/// Any unhealthy detector makes the scan unhealthy; otherwise any degraded
/// one makes it degraded. An empty map is healthy.
pub fn overall_status(detectors: &DetectorHealthMap) -> DetectorStatus {
    let mut has_degraded = false;

    for health in detectors.values() {
        match health.status {
            DetectorStatus::Unhealthy => return DetectorStatus::Unhealthy,
            DetectorStatus::Degraded => has_degraded = true,
            DetectorStatus::Healthy => {}
        }
    }

    if has_degraded {
        DetectorStatus::Degraded
    } else {
        DetectorStatus::Healthy
    }
}
