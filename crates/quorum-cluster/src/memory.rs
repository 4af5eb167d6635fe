//! In-process membership backend.
//!
//! `InMemoryCluster` keeps the member list behind a mutex and implements
//! `MembershipClient` directly. Clones share the same member list. Every
//! call is recorded, and individual operations can be made to fail, which
//! is what the supervisor tests use to walk the failure paths.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use quorum_core::{Endpoint, EndpointSet, Member, Shutdown, member_id};

use crate::client::{Connector, MembershipClient};
use crate::error::{ClusterError, ClusterResult};

/// Membership operations, for call recording and fault injection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Add(Vec<String>),
    Remove(u64),
}

impl Operation {
    fn kind(&self) -> OperationKind {
        match self {
            Operation::List => OperationKind::List,
            Operation::Add(_) => OperationKind::Add,
            Operation::Remove(_) => OperationKind::Remove,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum OperationKind {
    List,
    Add,
    Remove,
}

#[derive(Debug, Default)]
struct Inner {
    members: Vec<Member>,
    calls: Vec<Operation>,
    failing: HashSet<OperationKind>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster whose members each own one of the given peer URLs.
    pub fn with_peers<I, S>(peer_urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cluster = Self::new();
        for url in peer_urls {
            cluster.insert(member_for(vec![url.as_ref().to_string()]));
        }
        cluster
    }

    pub fn insert(&self, member: Member) {
        self.lock().members.push(member);
    }

    pub fn members(&self) -> Vec<Member> {
        self.lock().members.clone()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Operation> {
        self.lock().calls.clone()
    }

    /// Make every later call of the same kind as `op` fail. Arguments of
    /// `op` are ignored.
    pub fn fail_on(&self, op: Operation) {
        self.lock().failing.insert(op.kind());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not wedge the other tasks.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, op: Operation) -> ClusterResult<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        let kind = op.kind();
        let description = format!("{op:?}");
        inner.calls.push(op);
        if inner.failing.contains(&kind) {
            debug!(operation = %description, "injected membership failure");
            return Err(ClusterError::Status {
                method: description,
                path: "memory".to_string(),
                status: 503,
                message: "injected failure".to_string(),
            });
        }
        Ok(inner)
    }
}

/// Build a member record the way a registering node is named: after the
/// `host:port` of its first peer URL.
pub fn member_for(peer_urls: Vec<String>) -> Member {
    let name = peer_urls
        .first()
        .and_then(|url| Endpoint::parse(url).ok())
        .map(|ep| ep.host_port())
        .unwrap_or_default();
    Member {
        id: member_id(&name),
        name,
        peer_urls,
        client_urls: Vec::new(),
    }
}

impl MembershipClient for InMemoryCluster {
    async fn list_members(&self) -> ClusterResult<Vec<Member>> {
        let inner = self.record(Operation::List)?;
        Ok(inner.members.clone())
    }

    async fn add_member(&self, peer_urls: Vec<String>) -> ClusterResult<Member> {
        let mut inner = self.record(Operation::Add(peer_urls.clone()))?;
        let member = member_for(peer_urls);
        if inner.members.iter().any(|m| m.id == member.id) {
            return Err(ClusterError::Status {
                method: "add".to_string(),
                path: "memory".to_string(),
                status: 409,
                message: format!("member {} already exists", member.name),
            });
        }
        inner.members.push(member.clone());
        Ok(member)
    }

    async fn remove_member(&self, id: u64) -> ClusterResult<()> {
        let mut inner = self.record(Operation::Remove(id))?;
        let before = inner.members.len();
        inner.members.retain(|m| m.id != id);
        if inner.members.len() == before {
            return Err(ClusterError::Status {
                method: "remove".to_string(),
                path: "memory".to_string(),
                status: 404,
                message: format!("member {id:x} not found"),
            });
        }
        Ok(())
    }
}

/// `Connector` handing out clones of one `InMemoryCluster`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    cluster: InMemoryCluster,
    refuse: bool,
}

impl InMemoryConnector {
    pub fn new(cluster: InMemoryCluster) -> Self {
        Self {
            cluster,
            refuse: false,
        }
    }

    /// A connector whose every dial fails.
    pub fn unreachable() -> Self {
        Self {
            cluster: InMemoryCluster::new(),
            refuse: true,
        }
    }
}

impl Connector for InMemoryConnector {
    type Client = InMemoryCluster;

    async fn connect(
        &self,
        endpoints: &EndpointSet,
        shutdown: Shutdown,
    ) -> ClusterResult<Option<InMemoryCluster>> {
        if endpoints.is_empty() {
            return Ok(None);
        }
        if *shutdown.borrow() {
            return Err(ClusterError::Cancelled);
        }
        if self.refuse {
            return Err(ClusterError::Connect {
                endpoints: endpoints.host_ports(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(Some(self.cluster.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;

    #[tokio::test]
    async fn add_list_remove() {
        let cluster = InMemoryCluster::with_peers(["http://localhost:3380"]);
        let added = cluster
            .add_member(vec!["http://localhost:2380".to_string()])
            .await
            .unwrap();
        assert_eq!(added.name, "localhost:2380");
        assert_eq!(cluster.list_members().await.unwrap().len(), 2);

        cluster.remove_member(added.id).await.unwrap();
        assert_eq!(cluster.members().len(), 1);
        assert_eq!(
            cluster.calls(),
            vec![
                Operation::Add(vec!["http://localhost:2380".to_string()]),
                Operation::List,
                Operation::Remove(added.id),
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_add_conflicts() {
        let cluster = InMemoryCluster::with_peers(["http://localhost:2380"]);
        let err = cluster
            .add_member(vec!["http://localhost:2380".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn injected_failures() {
        let cluster = InMemoryCluster::new();
        cluster.fail_on(Operation::List);
        assert!(cluster.list_members().await.is_err());
        assert!(cluster.add_member(vec!["http://a:1".to_string()]).await.is_ok());
    }

    #[tokio::test]
    async fn connector_without_endpoints_returns_none() {
        let (_tx, rx) = watch::channel(false);
        let connector = InMemoryConnector::new(InMemoryCluster::new());
        assert!(connector.connect(&EndpointSet::parse(""), rx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_connector_fails() {
        let (_tx, rx) = watch::channel(false);
        let err = InMemoryConnector::unreachable()
            .connect(&EndpointSet::parse("http://localhost:9379"), rx)
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Connect { .. }));
    }

    #[tokio::test]
    async fn connector_honours_pending_shutdown() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let cluster = InMemoryCluster::new();
        let err = InMemoryConnector::new(cluster.clone())
            .connect(&EndpointSet::parse("http://localhost:9379"), rx)
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Cancelled));
        assert!(cluster.calls().is_empty());
    }
}
