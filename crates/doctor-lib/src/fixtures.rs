//! Pod and event builders shared by the unit tests

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStateWaiting,
    ContainerStatus, Event, ObjectReference, Pod, PodCondition, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

/// Fixed point in time, `secs` after the pod start
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub struct PodFixture {
    pod: Pod,
}

impl PodFixture {
    /// Running pod in `default`, started at `ts(0)`
    pub fn new(name: &str, uid: &str) -> Self {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                uid: Some(uid.to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                start_time: Some(Time(ts(0))),
                ..Default::default()
            }),
            ..Default::default()
        };
        Self { pod }
    }

    fn status(&mut self) -> &mut PodStatus {
        self.pod.status.get_or_insert_with(Default::default)
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.pod.metadata.namespace = Some(namespace.to_string());
        self
    }

    pub fn phase(mut self, phase: &str) -> Self {
        self.status().phase = Some(phase.to_string());
        self
    }

    pub fn no_status(mut self) -> Self {
        self.pod.status = None;
        self
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.pod
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn container(mut self, status: ContainerStatus) -> Self {
        self.status()
            .container_statuses
            .get_or_insert_with(Vec::new)
            .push(status);
        self
    }

    pub fn init_container(mut self, status: ContainerStatus) -> Self {
        self.status()
            .init_container_statuses
            .get_or_insert_with(Vec::new)
            .push(status);
        self
    }

    pub fn condition(
        mut self,
        type_: &str,
        status: &str,
        reason: Option<&str>,
        transitioned_at: DateTime<Utc>,
    ) -> Self {
        self.status()
            .conditions
            .get_or_insert_with(Vec::new)
            .push(PodCondition {
                type_: type_.to_string(),
                status: status.to_string(),
                reason: reason.map(str::to_string),
                message: reason.map(|r| format!("condition {type_} is {status}: {r}")),
                last_transition_time: Some(Time(transitioned_at)),
                ..Default::default()
            });
        self
    }

    pub fn build(self) -> Pod {
        self.pod
    }
}

fn container_with(name: &str, state: Option<ContainerState>) -> ContainerStatus {
    ContainerStatus {
        name: name.to_string(),
        state,
        ..Default::default()
    }
}

pub fn waiting(name: &str, reason: &str, message: &str) -> ContainerStatus {
    container_with(
        name,
        Some(ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some(reason.to_string()),
                message: Some(message.to_string()),
            }),
            ..Default::default()
        }),
    )
}

pub fn terminated(name: &str, exit_code: i32, reason: Option<&str>, message: &str) -> ContainerStatus {
    container_with(
        name,
        Some(ContainerState {
            terminated: Some(ContainerStateTerminated {
                exit_code,
                reason: reason.map(str::to_string),
                message: Some(message.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
    )
}

pub fn running(name: &str) -> ContainerStatus {
    container_with(
        name,
        Some(ContainerState {
            running: Some(ContainerStateRunning {
                started_at: Some(Time(ts(1))),
            }),
            ..Default::default()
        }),
    )
}

pub fn stateless(name: &str) -> ContainerStatus {
    container_with(name, None)
}

pub fn event(uid: &str, type_: &str, reason: &str, message: &str) -> Event {
    Event {
        involved_object: ObjectReference {
            kind: Some("Pod".to_string()),
            uid: Some(uid.to_string()),
            ..Default::default()
        },
        type_: Some(type_.to_string()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        ..Default::default()
    }
}
