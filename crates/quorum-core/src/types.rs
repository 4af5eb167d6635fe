//! Shared types used across quorum crates.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointSet;

/// A member of the consensus cluster as reported by the membership API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    /// `host:port` of the member's first peer URL.
    pub name: String,
    pub peer_urls: Vec<String>,
    #[serde(default)]
    pub client_urls: Vec<String>,
}

/// Deterministic member ID derived from the member name (FNV-1a 64-bit).
///
/// Every node derives the same ID for the same `host:port`, so IDs agree
/// across the cluster without coordination. Never returns 0.
pub fn member_id(name: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in name.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    if hash == 0 {
        hash = 1;
    }
    hash
}

/// Body of `POST /v1/members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMemberRequest {
    pub peer_urls: Vec<String>,
}

/// Envelope wrapping every membership API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Whether the engine bootstraps a fresh group or joins an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterState {
    New,
    Existing,
}

impl ClusterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterState::New => "new",
            ClusterState::Existing => "existing",
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The initial-cluster descriptor handed to the engine at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    /// `name=url` entries joined by commas.
    pub initial_cluster: String,
    pub cluster_state: ClusterState,
}

impl ClusterDescriptor {
    /// Split the descriptor back into `(name, url)` pairs. Entries without
    /// an `=` are ignored.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        self.initial_cluster
            .split(',')
            .filter_map(|entry| entry.split_once('='))
            .collect()
    }
}

/// Everything the engine needs to start one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub name: String,
    pub advertise_client_urls: EndpointSet,
    pub listen_client_urls: EndpointSet,
    pub advertise_peer_urls: EndpointSet,
    pub listen_peer_urls: EndpointSet,
    pub cluster: ClusterDescriptor,
}
