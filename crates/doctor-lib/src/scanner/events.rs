//! Per-pod event queries with bounded concurrency
//!
//! One query per pod, at most `concurrency` in flight. A failed query only
//! affects its own pod: it is recorded as a [`FetchFailure`] and the rest of
//! the batch carries on.

use std::collections::HashMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Event, Pod};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::anomaly::EventsByPod;
use crate::cluster::{CallContext, ClusterApi, ClusterError};
use crate::models::PodIdentity;
use crate::observability::ScanMetrics;

/// An event query that did not complete for one pod
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchFailure {
    pub pod: PodIdentity,
    pub pod_name: String,
    pub namespace: String,
    pub error: String,
    /// Stopped by cancellation or the deadline rather than a failed call
    pub cancelled: bool,
}

#[derive(Debug, Default)]
pub struct EventFetchOutcome {
    /// Events per pod; pods with no events or a failed query are absent
    pub events: EventsByPod,
    pub failures: Vec<FetchFailure>,
    /// Pods a query was issued for
    pub attempted: usize,
}

pub struct EventFetcher {
    api: Arc<dyn ClusterApi>,
    concurrency: usize,
    metrics: ScanMetrics,
}

impl EventFetcher {
    pub fn new(api: Arc<dyn ClusterApi>, concurrency: usize) -> Self {
        Self {
            api,
            concurrency: concurrency.max(1),
            metrics: ScanMetrics::new(),
        }
    }

    /// Fetch events for every pod of the snapshot.
    ///
    /// Fails only when the context itself was cancelled or ran past its
    /// deadline; individual query failures land in the outcome.
    pub async fn fetch(
        &self,
        namespace: Option<&str>,
        pods: &[Pod],
        ctx: &CallContext,
    ) -> Result<EventFetchOutcome, ClusterError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut outcome = EventFetchOutcome::default();
        // Pods whose task has not reported back; a task that panics never does
        let mut pending: HashMap<PodIdentity, (String, String)> = HashMap::new();

        for pod in pods {
            // Detectors already log pods without a uid
            let Some(identity) = PodIdentity::of(pod) else {
                continue;
            };

            let api = Arc::clone(&self.api);
            let semaphore = Arc::clone(&semaphore);
            let ctx = ctx.clone();
            let namespace = namespace.map(str::to_string);
            let pod_name = pod.metadata.name.clone().unwrap_or_default();
            let pod_namespace = pod.metadata.namespace.clone().unwrap_or_default();
            pending.insert(identity.clone(), (pod_name.clone(), pod_namespace.clone()));

            tasks.spawn(async move {
                let result =
                    fetch_one(api.as_ref(), &semaphore, namespace.as_deref(), &identity, &ctx)
                        .await;
                (identity, pod_name, pod_namespace, result)
            });
            outcome.attempted += 1;
        }

        while let Some(joined) = tasks.join_next().await {
            let (identity, pod_name, pod_namespace, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "Event query task failed");
                    self.metrics.inc_event_fetch_errors();
                    continue;
                }
            };
            pending.remove(&identity);

            match result {
                Ok(events) => {
                    debug!(
                        pod_name = %pod_name,
                        namespace = %pod_namespace,
                        count = events.len(),
                        "Fetched pod events"
                    );
                    if !events.is_empty() {
                        outcome.events.insert(identity, events);
                    }
                }
                Err(err) => {
                    self.metrics.inc_event_fetch_errors();
                    outcome.failures.push(FetchFailure {
                        pod: identity,
                        pod_name,
                        namespace: pod_namespace,
                        cancelled: err.is_cancellation(),
                        error: err.to_string(),
                    });
                }
            }
        }

        ctx.check()?;

        for (identity, (pod_name, pod_namespace)) in pending {
            outcome.failures.push(FetchFailure {
                pod: identity,
                pod_name,
                namespace: pod_namespace,
                error: "event query task failed".to_string(),
                cancelled: false,
            });
        }

        outcome
            .failures
            .sort_by(|a, b| (&a.namespace, &a.pod_name).cmp(&(&b.namespace, &b.pod_name)));
        Ok(outcome)
    }
}

async fn fetch_one(
    api: &dyn ClusterApi,
    semaphore: &Semaphore,
    namespace: Option<&str>,
    identity: &PodIdentity,
    ctx: &CallContext,
) -> Result<Vec<Event>, ClusterError> {
    let _permit = ctx
        .guard(async {
            semaphore
                .acquire()
                .await
                .map_err(|_| ClusterError::Cancelled)
        })
        .await?;

    api.list_events(namespace, identity.as_str(), ctx).await
}
