//! Node settings: defaults, optional TOML file, and explicit overrides.
//!
//! Precedence, lowest first: built-in defaults, the settings file, then
//! overrides (the CLI fills these from flags and environment variables).
//! Settings are built once at startup and passed down by value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::endpoint::EndpointSet;

pub const DEFAULT_CLIENT_ENDPOINTS: &str = "http://localhost:2379";
pub const DEFAULT_PEER_ENDPOINTS: &str = "http://localhost:2380";
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to render settings: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Client-facing URLs for this node.
    pub client_endpoints: String,
    /// Peer-facing URLs for this node.
    pub peer_endpoints: String,
    /// Client URLs of an existing cluster to join. Empty means bootstrap
    /// a new cluster.
    pub cluster_client_endpoints: String,
    /// Directory under which the node's data directory is created.
    pub data_root: PathBuf,
    /// Upper bound on waiting for the engine to report ready.
    pub ready_timeout_secs: u64,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            client_endpoints: DEFAULT_CLIENT_ENDPOINTS.to_string(),
            peer_endpoints: DEFAULT_PEER_ENDPOINTS.to_string(),
            cluster_client_endpoints: String::new(),
            data_root: PathBuf::from("."),
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
        }
    }
}

/// Values that take precedence over the settings file. `None` leaves the
/// underlying value alone.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub client_endpoints: Option<String>,
    pub peer_endpoints: Option<String>,
    pub cluster_client_endpoints: Option<String>,
    pub data_root: Option<PathBuf>,
    pub ready_timeout_secs: Option<u64>,
}

impl NodeSettings {
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the optional file, then the overrides.
    pub fn load(
        file: Option<&Path>,
        overrides: SettingsOverrides,
    ) -> Result<Self, SettingsError> {
        let base = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(overrides))
    }

    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        if let Some(v) = overrides.client_endpoints {
            self.client_endpoints = v;
        }
        if let Some(v) = overrides.peer_endpoints {
            self.peer_endpoints = v;
        }
        if let Some(v) = overrides.cluster_client_endpoints {
            self.cluster_client_endpoints = v;
        }
        if let Some(v) = overrides.data_root {
            self.data_root = v;
        }
        if let Some(v) = overrides.ready_timeout_secs {
            self.ready_timeout_secs = v;
        }
        self
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn client_set(&self) -> EndpointSet {
        EndpointSet::parse(&self.client_endpoints)
    }

    pub fn peer_set(&self) -> EndpointSet {
        EndpointSet::parse(&self.peer_endpoints)
    }

    pub fn cluster_client_set(&self) -> EndpointSet {
        EndpointSet::parse(&self.cluster_client_endpoints)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let settings = NodeSettings::default();
        assert_eq!(settings.client_endpoints, "http://localhost:2379");
        assert_eq!(settings.peer_endpoints, "http://localhost:2380");
        assert!(settings.cluster_client_set().is_empty());
        assert_eq!(settings.ready_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: NodeSettings = toml::from_str(
            r#"
cluster_client_endpoints = "http://10.0.0.1:2379"
"#,
        )
        .unwrap();
        assert_eq!(settings.cluster_client_endpoints, "http://10.0.0.1:2379");
        assert_eq!(settings.peer_endpoints, DEFAULT_PEER_ENDPOINTS);
    }

    #[test]
    fn overrides_beat_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "peer_endpoints = \"http://file:1\"").unwrap();
        writeln!(file, "client_endpoints = \"http://file:2\"").unwrap();

        let settings = NodeSettings::load(
            Some(file.path()),
            SettingsOverrides {
                peer_endpoints: Some("http://flag:1".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(settings.peer_endpoints, "http://flag:1");
        assert_eq!(settings.client_endpoints, "http://file:2");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = NodeSettings::load(
            Some(Path::new("/nonexistent/quorum.toml")),
            SettingsOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn renders_toml() {
        let rendered = NodeSettings::default().to_toml_string().unwrap();
        assert!(rendered.contains("peer_endpoints = \"http://localhost:2380\""));
    }
}
