//! Supervisor lifecycle phases.

use std::fmt;

/// Current phase of a supervised node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodePhase {
    /// Supervisor created, not running yet.
    #[default]
    Idle,
    /// Connecting to the existing cluster, if one is configured.
    ClientResolving,
    /// Registering this node with the existing cluster.
    Joining,
    /// Resolving the initial cluster and building the engine config.
    Configuring,
    /// Engine start requested.
    Starting,
    /// Engine started; waiting for it to report ready.
    WaitingReady,
    /// Serving until shutdown is requested.
    Running,
    /// Stopping the engine and leaving the cluster.
    Leaving,
    /// Shut down cleanly.
    Stopped,
    /// A stage failed; resources were released before reporting.
    Failed,
}

impl NodePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodePhase::Idle => "idle",
            NodePhase::ClientResolving => "client_resolving",
            NodePhase::Joining => "joining",
            NodePhase::Configuring => "configuring",
            NodePhase::Starting => "starting",
            NodePhase::WaitingReady => "waiting_ready",
            NodePhase::Running => "running",
            NodePhase::Leaving => "leaving",
            NodePhase::Stopped => "stopped",
            NodePhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodePhase::Stopped | NodePhase::Failed)
    }
}

impl fmt::Display for NodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stopped_and_failed_are_terminal() {
        assert!(NodePhase::Stopped.is_terminal());
        assert!(NodePhase::Failed.is_terminal());
        assert!(!NodePhase::Leaving.is_terminal());
        assert_eq!(NodePhase::WaitingReady.to_string(), "waiting_ready");
    }
}
