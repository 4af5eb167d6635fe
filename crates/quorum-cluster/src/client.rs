//! Discovery and membership client contracts.
//!
//! A `Connector` turns the configured cluster client endpoints into an
//! optional `MembershipClient`. No endpoints means there is no cluster to
//! join, which is not an error.

use std::future::Future;
use std::time::Duration;

use quorum_core::{EndpointSet, Member, Shutdown};

use crate::error::ClusterResult;

/// Upper bound on dialing a single cluster endpoint.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Queries and mutates the member list of a running cluster.
pub trait MembershipClient: Send + Sync {
    /// Current members with their advertised peer URLs.
    fn list_members(&self) -> impl Future<Output = ClusterResult<Vec<Member>>> + Send;

    /// Register a new member with the given peer URLs.
    fn add_member(
        &self,
        peer_urls: Vec<String>,
    ) -> impl Future<Output = ClusterResult<Member>> + Send;

    /// Remove the member with the given ID.
    fn remove_member(&self, id: u64) -> impl Future<Output = ClusterResult<()>> + Send;
}

/// Builds a `MembershipClient` from cluster client endpoints.
pub trait Connector: Send + Sync {
    type Client: MembershipClient + 'static;

    /// Returns `Ok(None)` when `endpoints` is empty. Dialing is abandoned
    /// with `ClusterError::Cancelled` once `shutdown` fires.
    fn connect(
        &self,
        endpoints: &EndpointSet,
        shutdown: Shutdown,
    ) -> impl Future<Output = ClusterResult<Option<Self::Client>>> + Send;
}
