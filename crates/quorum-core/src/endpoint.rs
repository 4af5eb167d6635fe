//! Endpoint parsing and deduplication.
//!
//! Endpoint lists arrive as comma-separated URL strings
//! (`http://10.0.0.1:2380,http://10.0.0.2:2380`). Each entry is parsed on
//! its own; a malformed entry is logged and dropped so one typo never takes
//! down the whole list.
//!
//! Deduplication compares the source strings exactly. `http://h:1` and
//! `http://h:1/` are two different entries.

use std::collections::HashSet;
use std::fmt;

use http::Uri;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("empty endpoint")]
    Empty,
    #[error("invalid endpoint URL {entry:?}: {reason}")]
    Invalid { entry: String, reason: String },
    #[error("endpoint {0:?} has no scheme")]
    MissingScheme(String),
    #[error("endpoint {0:?} has no host")]
    MissingHost(String),
    #[error("endpoint {0:?} has no port and no default port for its scheme")]
    MissingPort(String),
}

/// A single parsed endpoint: `scheme://host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// The entry this endpoint was parsed from.
    pub raw: String,
}

impl Endpoint {
    pub fn parse(entry: &str) -> Result<Self, EndpointError> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(EndpointError::Empty);
        }

        let uri: Uri = entry.parse().map_err(|e: http::uri::InvalidUri| {
            EndpointError::Invalid {
                entry: entry.to_string(),
                reason: e.to_string(),
            }
        })?;

        let scheme = uri
            .scheme_str()
            .ok_or_else(|| EndpointError::MissingScheme(entry.to_string()))?
            .to_ascii_lowercase();
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| EndpointError::MissingHost(entry.to_string()))?
            .to_string();
        // An explicit port that is empty or out of range is malformed; only a
        // missing port falls back to the scheme default.
        let port = match uri.port_u16() {
            Some(port) => port,
            None if has_port_part(&uri) => {
                return Err(EndpointError::Invalid {
                    entry: entry.to_string(),
                    reason: "port must be a number in 0..=65535".to_string(),
                });
            }
            None => default_port(&scheme)
                .ok_or_else(|| EndpointError::MissingPort(entry.to_string()))?,
        };

        Ok(Self {
            scheme,
            host,
            port,
            raw: entry.to_string(),
        })
    }

    /// `host:port`, used as the member name and for dialing.
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `scheme://host:port` with any path or trailing slash stripped.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Whether the authority carries a `:port` part, valid or not.
fn has_port_part(uri: &Uri) -> bool {
    let Some(authority) = uri.authority() else {
        return false;
    };
    let host_port = authority.as_str().rsplit('@').next().unwrap_or_default();
    let host_end = host_port.rfind(']').map_or(0, |i| i + 1);
    host_port[host_end..].contains(':')
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Ordered, duplicate-free list of endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSet {
    endpoints: Vec<Endpoint>,
}

impl EndpointSet {
    /// Parse a comma-separated endpoint list.
    ///
    /// Never fails: malformed entries are skipped with a warning and an
    /// empty string yields an empty set.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        Self::from_entries(raw.split(','))
    }

    /// Build a set from individual entries, dropping duplicates and
    /// malformed entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = dedupe(entries)
            .into_iter()
            .filter_map(|entry| match Endpoint::parse(&entry) {
                Ok(endpoint) => Some(endpoint),
                Err(e) => {
                    warn!(%entry, error = %e, "skipping unparsable endpoint");
                    None
                }
            })
            .collect();
        Self { endpoints }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.endpoints.iter()
    }

    pub fn first(&self) -> Option<&Endpoint> {
        self.endpoints.first()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// `scheme://host:port` for every endpoint.
    pub fn urls(&self) -> Vec<String> {
        self.endpoints.iter().map(Endpoint::url).collect()
    }

    /// `host:port` for every endpoint.
    pub fn host_ports(&self) -> Vec<String> {
        self.endpoints.iter().map(Endpoint::host_port).collect()
    }

    /// Source entries, in order.
    pub fn raw_entries(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.raw.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a EndpointSet {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

/// Remove later duplicates, keeping first-seen order. Entries are trimmed
/// and blank entries dropped; otherwise comparison is string-exact.
pub fn dedupe<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.as_ref().trim();
        if entry.is_empty() {
            continue;
        }
        if seen.insert(entry.to_string()) {
            out.push(entry.to_string());
        }
    }
    out
}
