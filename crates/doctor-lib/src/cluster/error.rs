//! Error types for cluster API access

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    /// Cluster access configuration missing or unreadable
    #[error("kubeconfig error: {0}")]
    Config(String),

    #[error("cannot reach the cluster API: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// The API server rejected or failed a request
    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    /// Client-side request failure (encoding, decoding, request building)
    #[error("request failed: {0}")]
    Request(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ClusterError {
    /// Check if this error is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            ClusterError::Connection(_) => true,
            // Throttling and server-side failures
            ClusterError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Check if the caller stopped the operation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ClusterError::Cancelled | ClusterError::DeadlineExceeded)
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 401 => ClusterError::Auth(resp.message),
            kube::Error::Api(resp) => ClusterError::Api {
                code: resp.code,
                message: resp.message,
            },
            kube::Error::Auth(e) => ClusterError::Auth(e.to_string()),
            kube::Error::HyperError(e) => ClusterError::Connection(e.to_string()),
            kube::Error::Service(e) => ClusterError::Connection(e.to_string()),
            kube::Error::InferConfig(e) => ClusterError::Config(e.to_string()),
            other => ClusterError::Request(other.to_string()),
        }
    }
}
