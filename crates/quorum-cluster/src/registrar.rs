//! Membership registrar — join before start, leave after stop.
//!
//! `join` registers the local node with an existing cluster and hands back
//! a `JoinGuard`. The guard must be released with `JoinGuard::leave` on
//! every exit path; leaving cannot happen in `Drop` because it is async, so
//! a guard dropped while still armed only logs an error.

use tracing::{debug, error, info, warn};

use quorum_core::{EndpointSet, Member};

use crate::client::MembershipClient;
use crate::error::{ClusterError, ClusterResult};

/// Pending leave for a node that joined an existing cluster.
#[must_use = "a joined node must leave the cluster with `JoinGuard::leave`"]
#[derive(Debug)]
pub struct JoinGuard {
    joined: Option<Member>,
}

impl JoinGuard {
    /// A guard with nothing to undo (no existing cluster was joined).
    pub fn skipped() -> Self {
        Self { joined: None }
    }

    /// The member registered by `join`, if any.
    pub fn member(&self) -> Option<&Member> {
        self.joined.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.joined.is_some()
    }

    /// Remove the joined member from the cluster. A no-op for a skipped
    /// guard.
    ///
    /// Fetches the current member list and removes the entry registered by
    /// `join`. An empty list, a missing entry, or a failed removal is an
    /// `ClusterError::Undo`: the cluster no longer looks the way this node
    /// left it and a stale member may remain.
    pub async fn leave<C: MembershipClient>(mut self, client: Option<&C>) -> ClusterResult<()> {
        let Some(member) = self.joined.take() else {
            return Ok(());
        };
        let undo = |reason: String| ClusterError::Undo {
            member_id: member.id,
            reason,
        };

        let client = client.ok_or_else(|| undo("no cluster client available".to_string()))?;

        let members = client
            .list_members()
            .await
            .map_err(|e| undo(format!("listing members: {e}")))?;
        if members.is_empty() {
            return Err(undo("cluster reported an empty member list".to_string()));
        }
        let target = members
            .iter()
            .find(|m| m.id == member.id)
            .ok_or_else(|| undo("member is no longer in the member list".to_string()))?;

        debug!(member_id = target.id, name = %target.name, "removing member");
        client
            .remove_member(target.id)
            .await
            .map_err(|e| undo(format!("remove: {e}")))?;

        info!(member_id = member.id, name = %member.name, "left cluster");
        Ok(())
    }
}

impl Drop for JoinGuard {
    fn drop(&mut self) {
        if let Some(member) = &self.joined {
            error!(
                member_id = member.id,
                name = %member.name,
                "join guard dropped without leaving; member is still registered"
            );
        }
    }
}

/// Register this node's peer URLs with the existing cluster.
///
/// Without a client there is no cluster to join: the returned guard is
/// skipped and nothing is sent. A rejected or failed add is returned as
/// `ClusterError::Join` and must abort startup; it is never retried here,
/// since a blind retry risks duplicate member entries.
pub async fn join<C: MembershipClient>(
    client: Option<&C>,
    peer_endpoints: &EndpointSet,
) -> ClusterResult<JoinGuard> {
    let Some(client) = client else {
        debug!("no existing cluster configured; skipping join");
        return Ok(JoinGuard::skipped());
    };

    let peer_urls = peer_endpoints.urls();
    match client.add_member(peer_urls.clone()).await {
        Ok(member) => {
            info!(member_id = member.id, name = %member.name, ?peer_urls, "joined existing cluster");
            Ok(JoinGuard {
                joined: Some(member),
            })
        }
        Err(e) => {
            warn!(?peer_urls, error = %e, "adding member to existing cluster failed");
            Err(ClusterError::Join {
                peer_urls,
                source: Box::new(e),
            })
        }
    }
}
