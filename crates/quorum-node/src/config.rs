//! Engine configuration assembly.

use tracing::debug;

use quorum_core::{ClusterDescriptor, NodeConfig, NodeSettings};

use crate::error::{NodeError, NodeResult};

/// Suffix of the per-node data directory under the data root.
pub const DATA_DIR_SUFFIX: &str = "quorum";

/// Build the engine configuration for this node.
///
/// The node is named after the `host:port` of its first peer endpoint, and
/// its data directory is `<data_root>/<name>.quorum`. Client and peer URL
/// sets are used for both advertise and listen.
pub fn build_node_config(
    settings: &NodeSettings,
    cluster: ClusterDescriptor,
) -> NodeResult<NodeConfig> {
    let peers = settings.peer_set();
    let first = peers.first().ok_or_else(|| {
        NodeError::Configuration(format!(
            "no valid peer endpoint in {:?}",
            settings.peer_endpoints
        ))
    })?;
    let name = first.host_port();
    let data_dir = settings
        .data_root
        .join(format!("{name}.{DATA_DIR_SUFFIX}"));
    let clients = settings.client_set();

    let config = NodeConfig {
        data_dir,
        name,
        advertise_client_urls: clients.clone(),
        listen_client_urls: clients,
        advertise_peer_urls: peers.clone(),
        listen_peer_urls: peers,
        cluster,
    };
    debug!(?config, "node configuration");
    Ok(config)
}
