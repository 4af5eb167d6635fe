//! Cluster membership error types.

use thiserror::Error;

/// Result type alias for cluster membership operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("could not reach any cluster endpoint {endpoints:?}: {reason}")]
    Connect { endpoints: Vec<String>, reason: String },

    #[error("connecting to the cluster was cancelled")]
    Cancelled,

    #[error("{method} {path} via {endpoint} failed: {reason}")]
    Transport {
        method: String,
        path: String,
        endpoint: String,
        reason: String,
    },

    #[error("{method} {path} returned {status}: {message}")]
    Status {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("listing cluster members failed: {0}")]
    Discovery(#[source] Box<ClusterError>),

    #[error("adding member with peer URLs {peer_urls:?} failed: {source}")]
    Join {
        peer_urls: Vec<String>,
        #[source]
        source: Box<ClusterError>,
    },

    #[error("removing member {member_id:x} from the cluster failed: {reason}")]
    Undo { member_id: u64, reason: String },
}

impl ClusterError {
    /// HTTP status for `Status` errors, looking through wrapper variants.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClusterError::Status { status, .. } => Some(*status),
            ClusterError::Discovery(inner) => inner.status(),
            ClusterError::Join { source, .. } => source.status(),
            _ => None,
        }
    }
}
