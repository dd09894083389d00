//! `kube`-backed cluster access
//!
//! Builds one client from the merged kubeconfig files at startup and reuses it for
//! every call. Transient failures (connection errors, throttling, 5xx) are
//! retried with exponential backoff; every attempt and every backoff sleep
//! honours the caller's cancellation and deadline.

use std::path::PathBuf;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tokio::time::Instant;
use tracing::{debug, info};

use super::retry::with_retry;
use super::{CallContext, ClusterApi, ClusterError, RetryPolicy};
use crate::observability::ScanMetrics;

/// Cluster API client over `kube`
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
    retry: RetryPolicy,
    metrics: ScanMetrics,
}

impl KubeClusterApi {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            metrics: ScanMetrics::new(),
        }
    }

    /// Build a client from one or more kubeconfig files, using the current
    /// context of the merged config.
    ///
    /// Any failure here is a configuration error and fatal for the run.
    pub async fn from_kubeconfig(paths: &[PathBuf], retry: RetryPolicy) -> Result<Self, ClusterError> {
        let kubeconfig = load_kubeconfig(paths)?;
        let sources = display_paths(paths);

        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| ClusterError::Config(format!("{sources}: {e}")))?;

        info!(
            kubeconfig = %sources,
            cluster_url = %config.cluster_url,
            "Cluster client configured"
        );

        let client = Client::try_from(config).map_err(|e| ClusterError::Config(e.to_string()))?;
        Ok(Self::new(client, retry))
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn events(&self, namespace: Option<&str>) -> Api<Event> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        ctx: &CallContext,
    ) -> Result<Vec<Pod>, ClusterError> {
        let api = &self.pods(namespace);
        let params = &ListParams::default();
        let metrics = &self.metrics;

        let pods = with_retry(&self.retry, "list_pods", ctx, move || async move {
            let started = Instant::now();
            let outcome = api.list(params).await;
            metrics.observe_api_latency("list_pods", started.elapsed().as_secs_f64());
            outcome.map(|list| list.items).map_err(ClusterError::from)
        })
        .await?;

        debug!(
            namespace = namespace.unwrap_or("*"),
            count = pods.len(),
            "Listed pods"
        );
        Ok(pods)
    }

    async fn list_events(
        &self,
        namespace: Option<&str>,
        involved_uid: &str,
        ctx: &CallContext,
    ) -> Result<Vec<Event>, ClusterError> {
        let api = &self.events(namespace);
        let params = &ListParams::default().fields(&format!("involvedObject.uid={involved_uid}"));
        let metrics = &self.metrics;

        with_retry(&self.retry, "list_events", ctx, move || async move {
            let started = Instant::now();
            let outcome = api.list(params).await;
            metrics.observe_api_latency("list_events", started.elapsed().as_secs_f64());
            outcome.map(|list| list.items).map_err(ClusterError::from)
        })
        .await
    }
}

/// Read kubeconfig files and merge them in order.
///
/// Earlier files win for scalar settings such as the current context,
/// following kubectl's `KUBECONFIG` list semantics.
pub fn load_kubeconfig(paths: &[PathBuf]) -> Result<Kubeconfig, ClusterError> {
    let mut merged: Option<Kubeconfig> = None;

    for path in paths {
        let next = Kubeconfig::read_from(path)
            .map_err(|e| ClusterError::Config(format!("{}: {}", path.display(), e)))?;
        merged = Some(match merged {
            Some(current) => current
                .merge(next)
                .map_err(|e| ClusterError::Config(format!("{}: {}", path.display(), e)))?,
            None => next,
        });
    }

    merged.ok_or_else(|| ClusterError::Config("no kubeconfig file given".to_string()))
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
