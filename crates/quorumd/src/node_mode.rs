//! `quorumd run` — supervise this node until interrupted.

use tokio::sync::watch;
use tracing::info;

use quorum_cluster::HttpConnector;
use quorum_core::NodeSettings;
use quorum_engine::EmbeddedEngine;
use quorum_node::Supervisor;

use crate::service::{ServiceGroup, shutdown_signal};

pub async fn run(settings: NodeSettings) -> anyhow::Result<()> {
    info!(
        client_endpoints = %settings.client_endpoints,
        peer_endpoints = %settings.peer_endpoints,
        cluster_client_endpoints = %settings.cluster_client_endpoints,
        "quorumd starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut services = ServiceGroup::new();
    let supervisor = Supervisor::new(settings, HttpConnector::new(), EmbeddedEngine::new());
    services.spawn("node", async move {
        supervisor.run(shutdown_rx).await?;
        Ok(())
    });

    let signals = tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let failed = services.wait().await;
    signals.abort();

    if failed > 0 {
        anyhow::bail!("{failed} service(s) failed");
    }
    info!("quorumd stopped");
    Ok(())
}
