//! In-process engine.
//!
//! `EmbeddedEngine` keeps the member list in a redb file under the node's
//! data directory and serves the membership API on every listen client
//! URL. It becomes ready as soon as all listeners are bound and serving.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use quorum_core::{Member, NodeConfig, Shutdown, member_id, wait_for_shutdown};

use crate::api::{ApiState, build_router};
use crate::engine::{Engine, EngineHandle};
use crate::error::{EngineError, EngineResult};
use crate::store::MemberStore;

/// File name of the member store inside the data directory.
pub const STORE_FILE: &str = "members.redb";

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedEngine;

impl EmbeddedEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for EmbeddedEngine {
    type Handle = EmbeddedHandle;

    async fn start(&self, config: NodeConfig) -> EngineResult<EmbeddedHandle> {
        if config.listen_client_urls.is_empty() {
            return Err(EngineError::NoListenAddress);
        }
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|source| EngineError::DataDir {
                path: config.data_dir.clone(),
                source,
            })?;
        let store = MemberStore::open(&config.data_dir.join(STORE_FILE))?;
        seed_members(&store, &config)?;

        let mut listeners = Vec::with_capacity(config.listen_client_urls.len());
        for addr in config.listen_client_urls.host_ports() {
            let listener = TcpListener::bind(addr.as_str())
                .await
                .map_err(|source| EngineError::Bind {
                    addr: addr.clone(),
                    source,
                })?;
            listeners.push(listener);
        }
        let client_addrs = listeners
            .iter()
            .map(|l| l.local_addr())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| EngineError::Bind {
                addr: config.listen_client_urls.host_ports().join(","),
                source,
            })?;

        let router = build_router(ApiState {
            store: store.clone(),
            name: config.name.clone(),
        });
        let (ready_tx, ready_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(serve(listeners, router, ready_tx, shutdown_rx));

        info!(
            name = %config.name,
            data_dir = %config.data_dir.display(),
            cluster_state = %config.cluster.cluster_state,
            listen = ?client_addrs,
            "engine started"
        );

        Ok(EmbeddedHandle {
            name: config.name,
            ready: ready_rx,
            shutdown: shutdown_tx,
            task,
            client_addrs,
            store,
        })
    }
}

/// Record every initial-cluster entry not already known, then the client
/// URLs this node advertises.
fn seed_members(store: &MemberStore, config: &NodeConfig) -> EngineResult<()> {
    for (name, url) in config.cluster.entries() {
        let member = Member {
            id: member_id(name),
            name: name.to_string(),
            peer_urls: vec![url.to_string()],
            client_urls: Vec::new(),
        };
        if store.put_member_if_absent(&member)? {
            debug!(member_id = member.id, name, "seeded member from initial cluster");
        }
    }

    let own_id = member_id(&config.name);
    if store.get_member(own_id)?.is_some() {
        store.set_client_urls(own_id, config.advertise_client_urls.urls())?;
    }
    Ok(())
}

async fn serve(
    listeners: Vec<TcpListener>,
    router: Router,
    ready: watch::Sender<bool>,
    shutdown: Shutdown,
) -> EngineResult<()> {
    let mut servers = JoinSet::new();
    for listener in listeners {
        let router = router.clone();
        let mut shutdown = shutdown.clone();
        servers.spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { wait_for_shutdown(&mut shutdown).await })
                .await
        });
    }
    let _ = ready.send(true);

    let mut result = Ok(());
    while let Some(joined) = servers.join_next().await {
        let outcome = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => format!("server error: {e}"),
            Err(e) => format!("server task failed: {e}"),
        };
        error!(error = %outcome, "membership API listener exited");
        if result.is_ok() {
            result = Err(EngineError::Exited(outcome));
        }
    }
    result
}

/// Handle to a running `EmbeddedEngine`.
#[derive(Debug)]
pub struct EmbeddedHandle {
    name: String,
    ready: watch::Receiver<bool>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<EngineResult<()>>,
    client_addrs: Vec<SocketAddr>,
    store: MemberStore,
}

impl EmbeddedHandle {
    /// Addresses actually bound for the membership API, in listen-URL order.
    pub fn client_addrs(&self) -> &[SocketAddr] {
        &self.client_addrs
    }

    pub fn store(&self) -> &MemberStore {
        &self.store
    }
}

impl EngineHandle for EmbeddedHandle {
    async fn ready(&mut self) -> EngineResult<()> {
        let became_ready = self.ready.wait_for(|ready| *ready).await.is_ok();
        if became_ready {
            Ok(())
        } else {
            Err(EngineError::Exited(
                "engine stopped before becoming ready".to_string(),
            ))
        }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(Ok(())) => info!(name = %self.name, "engine stopped"),
            Ok(Err(e)) => warn!(name = %self.name, error = %e, "engine stopped with error"),
            Err(e) => error!(name = %self.name, error = %e, "engine task panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use quorum_cluster::{HttpMembershipClient, MembershipClient, DIAL_TIMEOUT};
    use quorum_core::{ClusterDescriptor, ClusterState, EndpointSet};

    fn config(data_dir: &Path, listen: &str, initial_cluster: &str) -> NodeConfig {
        NodeConfig {
            data_dir: data_dir.to_path_buf(),
            name: "127.0.0.1:2380".to_string(),
            advertise_client_urls: EndpointSet::parse("http://127.0.0.1:2379"),
            listen_client_urls: EndpointSet::parse(listen),
            advertise_peer_urls: EndpointSet::parse("http://127.0.0.1:2380"),
            listen_peer_urls: EndpointSet::parse("http://127.0.0.1:2380"),
            cluster: ClusterDescriptor {
                initial_cluster: initial_cluster.to_string(),
                cluster_state: ClusterState::New,
            },
        }
    }

    async fn client_for(handle: &EmbeddedHandle) -> HttpMembershipClient {
        let (_tx, rx) = watch::channel(false);
        let endpoints = EndpointSet::parse(&format!("http://{}", handle.client_addrs()[0]));
        HttpMembershipClient::connect(&endpoints, DIAL_TIMEOUT, rx)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn serves_seeded_members() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(
            &dir.path().join("node"),
            "http://127.0.0.1:0",
            "127.0.0.1:2380=http://127.0.0.1:2380,10.0.0.2:2380=http://10.0.0.2:2380",
        );

        let mut handle = EmbeddedEngine::new().start(cfg).await.unwrap();
        handle.ready().await.unwrap();
        assert!(dir.path().join("node").join(STORE_FILE).exists());

        let client = client_for(&handle).await;
        let members = client.list_members().await.unwrap();
        assert_eq!(members.len(), 2);
        let own = members
            .iter()
            .find(|m| m.name == "127.0.0.1:2380")
            .unwrap();
        assert_eq!(own.client_urls, vec!["http://127.0.0.1:2379"]);

        let added = client
            .add_member(vec!["http://10.0.0.3:2380".to_string()])
            .await
            .unwrap();
        client.remove_member(added.id).await.unwrap();

        handle.stop().await;
    }

    #[tokio::test]
    async fn members_persist_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(
            dir.path(),
            "http://127.0.0.1:0",
            "127.0.0.1:2380=http://127.0.0.1:2380",
        );

        let mut handle = EmbeddedEngine::new().start(cfg.clone()).await.unwrap();
        handle.ready().await.unwrap();
        client_for(&handle)
            .await
            .add_member(vec!["http://10.0.0.3:2380".to_string()])
            .await
            .unwrap();
        handle.stop().await;

        let mut handle = EmbeddedEngine::new().start(cfg).await.unwrap();
        handle.ready().await.unwrap();
        assert_eq!(handle.store().list_members().unwrap().len(), 2);
        handle.stop().await;
    }

    #[tokio::test]
    async fn no_listen_url_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), "", "127.0.0.1:2380=http://127.0.0.1:2380");

        let err = EmbeddedEngine::new().start(cfg).await.unwrap_err();
        assert!(matches!(err, EngineError::NoListenAddress));
    }

    #[tokio::test]
    async fn busy_port_fails_to_start() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(
            dir.path(),
            &format!("http://{addr}"),
            "127.0.0.1:2380=http://127.0.0.1:2380",
        );

        let err = EmbeddedEngine::new().start(cfg).await.unwrap_err();
        assert!(matches!(err, EngineError::Bind { .. }));
    }

    #[tokio::test]
    async fn stop_before_ready_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), "http://127.0.0.1:0", "");
        let handle = EmbeddedEngine::new().start(cfg).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle.stop())
            .await
            .unwrap();
    }
}
