//! Access to cluster state
//!
//! This module provides:
//! - The `ClusterApi` seam the scanner reads pods and events through
//! - A `kube`-backed implementation with retry and exponential backoff
//! - Call contexts carrying cancellation and deadlines

mod error;
mod kube_api;
mod retry;

pub use error::ClusterError;
pub use kube_api::{load_kubeconfig, KubeClusterApi};
pub use retry::with_retry;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Pod};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Read-only view of the cluster used by the scanner
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List pods in a namespace, or across all namespaces when `None`
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        ctx: &CallContext,
    ) -> Result<Vec<Pod>, ClusterError>;

    /// List events whose involved object has the given uid
    async fn list_events(
        &self,
        namespace: Option<&str>,
        involved_uid: &str,
        ctx: &CallContext,
    ) -> Result<Vec<Event>, ClusterError>;
}

/// Cancellation and deadline shared by every call of one scan
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Set a deadline `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail if the context was cancelled or its deadline passed
    pub fn check(&self) -> Result<(), ClusterError> {
        if self.cancel.is_cancelled() {
            return Err(ClusterError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ClusterError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Run `fut` until it completes, the context is cancelled, or the
    /// deadline passes
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, ClusterError>
    where
        F: Future<Output = Result<T, ClusterError>>,
    {
        self.check()?;

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| ClusterError::DeadlineExceeded)?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ClusterError::Cancelled),
            outcome = bounded => outcome,
        }
    }
}

/// Retry settings for transient API failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Backoff after the given failed attempt (1-based), doubling each time
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}
