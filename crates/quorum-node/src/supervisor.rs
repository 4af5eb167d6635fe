//! Node supervisor.
//!
//! One `Supervisor` runs one node: connect to the existing cluster (if
//! any), join it, resolve the initial cluster, start the engine, wait for
//! it to become ready, then run until the shared shutdown signal fires.
//!
//! Teardown runs in reverse acquisition order on every exit path: the
//! engine is stopped before the node leaves the cluster, and the cluster
//! client is dropped last. A successful join is always paired with exactly
//! one leave.

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use quorum_cluster::{ClusterError, Connector, join, resolve};
use quorum_core::{EndpointSet, NodeSettings, Shutdown, wait_for_shutdown};
use quorum_engine::{Engine, EngineHandle};

use crate::config::build_node_config;
use crate::error::{NodeError, NodeResult};
use crate::phase::NodePhase;

pub struct Supervisor<C, E> {
    settings: NodeSettings,
    connector: C,
    engine: E,
    phase: watch::Sender<NodePhase>,
}

impl<C: Connector, E: Engine> Supervisor<C, E> {
    pub fn new(settings: NodeSettings, connector: C, engine: E) -> Self {
        let (phase, _) = watch::channel(NodePhase::Idle);
        Self {
            settings,
            connector,
            engine,
            phase,
        }
    }

    /// Watch the supervisor's lifecycle phase.
    pub fn subscribe(&self) -> watch::Receiver<NodePhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> NodePhase {
        *self.phase.borrow()
    }

    fn transition(&self, next: NodePhase) {
        let changed = self.phase.send_if_modified(|phase| {
            if *phase == next {
                return false;
            }
            *phase = next;
            true
        });
        if changed {
            info!(phase = %next, "node phase");
        }
    }

    /// Run the node until `shutdown` fires or a stage fails.
    pub async fn run(self, shutdown: Shutdown) -> NodeResult<()> {
        let result = self.run_node(shutdown).await;
        match &result {
            Ok(()) => self.transition(NodePhase::Stopped),
            Err(e) => {
                error!(error = %e, "node failed");
                self.transition(NodePhase::Failed);
            }
        }
        result
    }

    async fn run_node(&self, mut shutdown: Shutdown) -> NodeResult<()> {
        self.transition(NodePhase::ClientResolving);
        let endpoints = self.settings.cluster_client_set();
        let client = match self.connector.connect(&endpoints, shutdown.clone()).await {
            Ok(client) => client,
            Err(ClusterError::Cancelled) => {
                info!("shutdown requested while connecting to the cluster");
                return Ok(());
            }
            Err(e) => {
                warn!(endpoints = ?endpoints.host_ports(), error = %e, "cluster connection failed");
                return Err(NodeError::Connection(e));
            }
        };
        if client.is_none() {
            debug!("no cluster client endpoints; bootstrapping a new cluster");
        }

        let peers = self.settings.peer_set();
        if peers.is_empty() {
            return Err(NodeError::Configuration(format!(
                "no valid peer endpoint in {:?}",
                self.settings.peer_endpoints
            )));
        }

        self.transition(NodePhase::Joining);
        let guard = join(client.as_ref(), &peers)
            .await
            .map_err(NodeError::Join)?;

        let outcome = self
            .run_joined(client.as_ref(), &peers, &mut shutdown)
            .await;

        self.transition(NodePhase::Leaving);
        let left = guard.leave(client.as_ref()).await;
        drop(client);

        match (outcome, left) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => Err(NodeError::Undo(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(undo)) => {
                error!(error = %undo, "leaving the cluster failed after an earlier failure");
                Err(e)
            }
        }
    }

    /// Everything between join and leave.
    async fn run_joined(
        &self,
        client: Option<&C::Client>,
        peers: &EndpointSet,
        shutdown: &mut Shutdown,
    ) -> NodeResult<()> {
        self.transition(NodePhase::Configuring);
        let descriptor = resolve(peers, client)
            .await
            .map_err(NodeError::Discovery)?;
        let config = build_node_config(&self.settings, descriptor)?;
        info!(
            name = %config.name,
            initial_cluster = %config.cluster.initial_cluster,
            cluster_state = %config.cluster.cluster_state,
            "starting engine"
        );

        self.transition(NodePhase::Starting);
        let mut handle = self.engine.start(config).await.map_err(|e| {
            warn!(error = %e, "engine failed to start");
            NodeError::Start(e)
        })?;

        self.transition(NodePhase::WaitingReady);
        let timeout = self.settings.ready_timeout();
        let waited = tokio::select! {
            ready = tokio::time::timeout(timeout, handle.ready()) => Some(ready),
            _ = wait_for_shutdown(shutdown) => None,
        };

        match waited {
            Some(Ok(Ok(()))) => {
                info!("engine is ready");
                self.transition(NodePhase::Running);
                wait_for_shutdown(shutdown).await;
                info!("shutdown requested");
            }
            Some(Ok(Err(e))) => {
                warn!(error = %e, "engine exited before becoming ready");
                stop_engine(handle).await;
                return Err(NodeError::NotReady(e));
            }
            Some(Err(_)) => {
                warn!(?timeout, "engine took too long to become ready; stopping it");
                stop_engine(handle).await;
                return Err(NodeError::ReadinessTimeout(timeout));
            }
            None => {
                info!("shutdown requested before the engine became ready");
            }
        }

        self.transition(NodePhase::Leaving);
        stop_engine(handle).await;
        Ok(())
    }
}

/// Stop the engine on its own task so a panic inside `stop` cannot skip the
/// leave that follows.
async fn stop_engine<H: EngineHandle>(handle: H) {
    if let Err(e) = tokio::spawn(handle.stop()).await {
        error!(error = %e, "engine stop panicked");
    }
}
