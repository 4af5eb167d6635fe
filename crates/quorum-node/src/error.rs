//! Node supervisor error types.

use std::time::Duration;

use thiserror::Error;

use quorum_cluster::ClusterError;
use quorum_engine::EngineError;

/// Result type alias for supervisor operations.
pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("connecting to the existing cluster failed: {0}")]
    Connection(#[source] ClusterError),

    #[error("joining the existing cluster failed: {0}")]
    Join(#[source] ClusterError),

    #[error("resolving the initial cluster failed: {0}")]
    Discovery(#[source] ClusterError),

    #[error("invalid node configuration: {0}")]
    Configuration(String),

    #[error("engine failed to start: {0}")]
    Start(#[source] EngineError),

    #[error("engine exited before becoming ready: {0}")]
    NotReady(#[source] EngineError),

    #[error("engine was not ready within {0:?}")]
    ReadinessTimeout(Duration),

    #[error("leaving the cluster failed: {0}")]
    Undo(#[source] ClusterError),
}
