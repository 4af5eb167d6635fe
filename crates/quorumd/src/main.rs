//! quorumd — the quorum node daemon.
//!
//! Bootstraps this node into a new or existing cluster, supervises the
//! engine until interrupted, and removes the node from the cluster on the
//! way out.
//!
//! # Usage
//!
//! ```text
//! quorumd --peer-endpoints http://10.0.0.2:2380 \
//!         --client-endpoints http://10.0.0.2:2379 \
//!         --cluster-client-endpoints http://10.0.0.1:2379
//! quorumd members --cluster-client-endpoints http://10.0.0.1:2379
//! quorumd config --config /etc/quorum/node.toml
//! ```

mod node_mode;
mod service;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use quorum_cluster::{Connector, HttpConnector, MembershipClient};
use quorum_core::{NodeSettings, SettingsOverrides};

const DEFAULT_LOG_FILTER: &str = "info,quorumd=debug,quorum=debug";

#[derive(Debug, Parser)]
#[command(name = "quorumd", about = "quorum node daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the node until interrupted (the default).
    Run,
    /// Print the member list of the cluster as JSON.
    Members,
    /// Print the resolved settings as TOML.
    Config,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    /// Settings file (TOML).
    #[arg(long, global = true, env = "QUORUM_CONFIG")]
    config: Option<PathBuf>,

    /// Client URLs for this node. Default: http://localhost:2379
    #[arg(long, global = true, env = "QUORUM_CLIENT_ENDPOINTS", value_name = "LIST")]
    client_endpoints: Option<String>,

    /// Peer URLs for this node. Default: http://localhost:2380
    #[arg(long, global = true, env = "QUORUM_PEER_ENDPOINTS", value_name = "LIST")]
    peer_endpoints: Option<String>,

    /// Client URLs of an existing cluster to join. Empty bootstraps a new
    /// cluster.
    #[arg(
        long,
        global = true,
        env = "QUORUM_CLUSTER_CLIENT_ENDPOINTS",
        value_name = "LIST"
    )]
    cluster_client_endpoints: Option<String>,

    /// Directory holding the node's data directory.
    #[arg(long, global = true, env = "QUORUM_DATA_ROOT", value_name = "DIR")]
    data_root: Option<PathBuf>,

    /// Seconds to wait for the engine to become ready.
    #[arg(long, global = true, env = "QUORUM_READY_TIMEOUT", value_name = "SECS")]
    ready_timeout: Option<u64>,
}

impl SettingsArgs {
    fn load(&self) -> anyhow::Result<NodeSettings> {
        let overrides = SettingsOverrides {
            client_endpoints: self.client_endpoints.clone(),
            peer_endpoints: self.peer_endpoints.clone(),
            cluster_client_endpoints: self.cluster_client_endpoints.clone(),
            data_root: self.data_root.clone(),
            ready_timeout_secs: self.ready_timeout,
        };
        NodeSettings::load(self.config.as_deref(), overrides).context("loading settings")
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let settings = cli.settings.load()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => node_mode::run(settings).await,
        Command::Members => print_members(&settings).await,
        Command::Config => {
            print!("{}", settings.to_toml_string()?);
            Ok(())
        }
    }
}

/// List members through the cluster client endpoints, or through this
/// node's own client endpoints when none are configured.
async fn print_members(settings: &NodeSettings) -> anyhow::Result<()> {
    let mut endpoints = settings.cluster_client_set();
    if endpoints.is_empty() {
        endpoints = settings.client_set();
    }

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let client = HttpConnector::new()
        .connect(&endpoints, shutdown_rx)
        .await?
        .context("no valid client endpoint to query")?;
    let members = client.list_members().await?;
    println!("{}", serde_json::to_string_pretty(&members)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["quorumd"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.log_json);
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        let err = Cli::try_parse_from(["quorumd", "destroy"]).unwrap_err();
        assert!(matches!(
            err.kind(),
            clap::error::ErrorKind::InvalidSubcommand | clap::error::ErrorKind::UnknownArgument
        ));
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::try_parse_from([
            "quorumd",
            "members",
            "--peer-endpoints",
            "http://10.0.0.2:2380",
            "--ready-timeout",
            "5",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::Members)));

        let settings = cli.settings.load().unwrap();
        assert_eq!(settings.peer_endpoints, "http://10.0.0.2:2380");
        assert_eq!(settings.ready_timeout_secs, 5);
    }

    #[test]
    fn flags_win_over_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(
            &path,
            "client_endpoints = \"http://10.0.0.9:2379\"\npeer_endpoints = \"http://10.0.0.9:2380\"\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "quorumd",
            "config",
            "--config",
            path.to_str().unwrap(),
            "--client-endpoints",
            "http://10.0.0.1:2379",
        ])
        .unwrap();

        let settings = cli.settings.load().unwrap();
        assert_eq!(settings.client_endpoints, "http://10.0.0.1:2379");
        assert_eq!(settings.peer_endpoints, "http://10.0.0.9:2380");
    }
}
