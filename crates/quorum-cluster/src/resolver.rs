//! Initial-cluster resolution.
//!
//! Combines the local peer endpoints with the peers of an existing cluster
//! into the `initial_cluster` string the engine starts from, and decides
//! whether the engine bootstraps a new group or joins an existing one.

use tracing::{debug, warn};

use quorum_core::{ClusterDescriptor, ClusterState, EndpointSet};

use crate::client::MembershipClient;
use crate::error::{ClusterError, ClusterResult};

/// Resolve the cluster descriptor for a node with the given peer endpoints.
///
/// Local peers come first, then every peer URL advertised by the existing
/// cluster; the combined list is deduplicated before rendering, so the
/// local node appears exactly once even when discovery reports it too. A
/// failed member query is returned as `ClusterError::Discovery`; no partial
/// descriptor is ever produced.
pub async fn resolve<C: MembershipClient>(
    peer_endpoints: &EndpointSet,
    client: Option<&C>,
) -> ClusterResult<ClusterDescriptor> {
    let mut urls = peer_endpoints.raw_entries();
    let mut cluster_state = ClusterState::New;

    if let Some(client) = client {
        let members = client.list_members().await.map_err(|e| {
            warn!(error = %e, "listing cluster members failed");
            ClusterError::Discovery(Box::new(e))
        })?;
        for member in &members {
            urls.extend(member.peer_urls.iter().cloned());
        }
        debug!(members = members.len(), "discovered existing cluster");
        cluster_state = ClusterState::Existing;
    }

    let initial_cluster = render_initial_cluster(&EndpointSet::from_entries(urls));
    debug!(%initial_cluster, %cluster_state, "resolved initial cluster");

    Ok(ClusterDescriptor {
        initial_cluster,
        cluster_state,
    })
}

/// Render `host:port=scheme://host:port` entries joined by commas.
pub fn render_initial_cluster(peers: &EndpointSet) -> String {
    peers
        .iter()
        .map(|ep| format!("{}={}", ep.host_port(), ep.url()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryCluster, Operation};

    const NO_CLIENT: Option<&InMemoryCluster> = None;

    #[tokio::test]
    async fn fresh_cluster_without_client() {
        let peers = EndpointSet::parse("http://localhost:2380");
        let descriptor = resolve(&peers, NO_CLIENT).await.unwrap();

        assert_eq!(descriptor.cluster_state, ClusterState::New);
        assert_eq!(
            descriptor.initial_cluster,
            "localhost:2380=http://localhost:2380"
        );
    }

    #[tokio::test]
    async fn fresh_cluster_has_one_entry_per_unique_peer() {
        let peers = EndpointSet::parse("http://a:1,http://b:2,http://a:1,https://c:3");
        let descriptor = resolve(&peers, NO_CLIENT).await.unwrap();

        assert_eq!(descriptor.cluster_state, ClusterState::New);
        assert_eq!(
            descriptor.initial_cluster,
            "a:1=http://a:1,b:2=http://b:2,c:3=https://c:3"
        );
    }

    #[tokio::test]
    async fn existing_cluster_merges_discovered_peers() {
        let cluster = InMemoryCluster::with_peers(["http://localhost:3380"]);
        let peers = EndpointSet::parse("http://localhost:2380");

        let descriptor = resolve(&peers, Some(&cluster)).await.unwrap();

        assert_eq!(descriptor.cluster_state, ClusterState::Existing);
        let entries = descriptor.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&("localhost:3380", "http://localhost:3380")));
        assert!(entries.contains(&("localhost:2380", "http://localhost:2380")));
    }

    #[tokio::test]
    async fn self_reported_by_discovery_appears_once() {
        let cluster = InMemoryCluster::with_peers([
            "http://n1:2380",
            "http://n2:2380",
            "http://localhost:2380",
        ]);
        let peers = EndpointSet::parse("http://localhost:2380");

        let descriptor = resolve(&peers, Some(&cluster)).await.unwrap();

        assert_eq!(
            descriptor.initial_cluster,
            "localhost:2380=http://localhost:2380,n1:2380=http://n1:2380,n2:2380=http://n2:2380"
        );
    }

    #[tokio::test]
    async fn empty_existing_cluster_is_still_existing() {
        let cluster = InMemoryCluster::new();
        let peers = EndpointSet::parse("http://localhost:2380");

        let descriptor = resolve(&peers, Some(&cluster)).await.unwrap();

        assert_eq!(descriptor.cluster_state, ClusterState::Existing);
        assert_eq!(
            descriptor.initial_cluster,
            "localhost:2380=http://localhost:2380"
        );
    }

    #[tokio::test]
    async fn discovery_failure_propagates() {
        let cluster = InMemoryCluster::with_peers(["http://localhost:3380"]);
        cluster.fail_on(Operation::List);
        let peers = EndpointSet::parse("http://localhost:2380");

        let err = resolve(&peers, Some(&cluster)).await.unwrap_err();
        assert!(matches!(err, ClusterError::Discovery(_)));
    }

    #[tokio::test]
    async fn malformed_discovered_urls_are_dropped() {
        let cluster = InMemoryCluster::with_peers(["garbage peer", "http://n1:2380"]);
        let peers = EndpointSet::parse("http://localhost:2380");

        let descriptor = resolve(&peers, Some(&cluster)).await.unwrap();
        assert_eq!(descriptor.entries().len(), 2);
    }
}
