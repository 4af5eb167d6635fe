//! HTTP membership client.
//!
//! Speaks the JSON membership API (`/v1/members`) served by every running
//! node. Each request opens a fresh HTTP/1.1 connection to the endpoint
//! selected at connect time; there is no pooling since membership calls
//! happen a handful of times per node lifetime.
//!
//! Only plain `http` endpoints are dialed. There is no TLS stack, so an
//! `https` endpoint fails the connect rather than being spoken to in clear.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use quorum_core::{AddMemberRequest, ApiResponse, EndpointSet, Member, Shutdown, wait_for_shutdown};

use crate::client::{Connector, DIAL_TIMEOUT, MembershipClient};
use crate::error::{ClusterError, ClusterResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MEMBERS_PATH: &str = "/v1/members";

/// Membership client bound to one reachable cluster endpoint.
#[derive(Debug, Clone)]
pub struct HttpMembershipClient {
    /// `host:port` of the endpoint that answered the dial.
    endpoint: String,
    dial_timeout: Duration,
    request_timeout: Duration,
}

impl HttpMembershipClient {
    /// Dial the endpoints in order and keep the first one that answers.
    ///
    /// Returns `Ok(None)` for an empty endpoint set. A pending shutdown wins
    /// over any dial.
    pub async fn connect(
        endpoints: &EndpointSet,
        dial_timeout: Duration,
        mut shutdown: Shutdown,
    ) -> ClusterResult<Option<Self>> {
        if endpoints.is_empty() {
            return Ok(None);
        }

        let addrs = endpoints.host_ports();
        if let Some(endpoint) = endpoints.iter().find(|e| e.scheme != "http") {
            warn!(endpoint = %endpoint.raw, "refusing non-http cluster endpoint");
            return Err(ClusterError::Connect {
                endpoints: addrs,
                reason: format!(
                    "unsupported scheme {:?} in {}; only http is supported",
                    endpoint.scheme, endpoint.raw
                ),
            });
        }
        let mut failures = Vec::new();

        for addr in &addrs {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown) => {
                    return Err(ClusterError::Cancelled);
                }
                dialed = tokio::time::timeout(dial_timeout, TcpStream::connect(addr.as_str())) => {
                    match dialed {
                        Ok(Ok(_)) => {
                            info!(endpoint = %addr, "connected to cluster");
                            return Ok(Some(Self {
                                endpoint: addr.clone(),
                                dial_timeout,
                                request_timeout: REQUEST_TIMEOUT,
                            }));
                        }
                        Ok(Err(e)) => {
                            debug!(endpoint = %addr, error = %e, "cluster endpoint dial failed");
                            failures.push(format!("{addr}: {e}"));
                        }
                        Err(_) => {
                            debug!(endpoint = %addr, ?dial_timeout, "cluster endpoint dial timed out");
                            failures.push(format!("{addr}: timed out after {dial_timeout:?}"));
                        }
                    }
                }
            }
        }

        warn!(endpoints = ?addrs, "no cluster endpoint reachable");
        Err(ClusterError::Connect {
            endpoints: addrs,
            reason: failures.join("; "),
        })
    }

    /// `host:port` this client sends requests to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> ClusterResult<T> {
        let transport = |reason: String| ClusterError::Transport {
            method: method.to_string(),
            path: path.to_string(),
            endpoint: self.endpoint.clone(),
            reason,
        };

        let stream = tokio::time::timeout(self.dial_timeout, TcpStream::connect(self.endpoint.as_str()))
            .await
            .map_err(|_| transport(format!("dial timed out after {:?}", self.dial_timeout)))?
            .map_err(|e| transport(format!("dial: {e}")))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| transport(format!("handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = Request::builder()
            .method(method.clone())
            .uri(format!("http://{}{}", self.endpoint, path))
            .header(HOST, &self.endpoint)
            .header(USER_AGENT, "quorum/0.1")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| transport(format!("build request: {e}")))?;

        let resp = tokio::time::timeout(self.request_timeout, sender.send_request(req))
            .await
            .map_err(|_| transport(format!("no response after {:?}", self.request_timeout)))?
            .map_err(|e| transport(format!("send: {e}")))?;

        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| transport(format!("read body: {e}")))?
            .to_bytes();

        let envelope = serde_json::from_slice::<ApiResponse<T>>(&bytes);

        if !status.is_success() {
            let message = match envelope {
                Ok(ApiResponse { error: Some(e), .. }) => e,
                _ => String::from_utf8_lossy(&bytes).into_owned(),
            };
            return Err(ClusterError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let envelope = envelope.map_err(|e| ClusterError::Decode(format!("{method} {path}: {e}")))?;
        if !envelope.success {
            return Err(ClusterError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                message: envelope.error.unwrap_or_default(),
            });
        }
        envelope
            .data
            .ok_or_else(|| ClusterError::Decode(format!("{method} {path}: response has no data")))
    }
}

impl MembershipClient for HttpMembershipClient {
    async fn list_members(&self) -> ClusterResult<Vec<Member>> {
        self.request(Method::GET, MEMBERS_PATH, None).await
    }

    async fn add_member(&self, peer_urls: Vec<String>) -> ClusterResult<Member> {
        let body = serde_json::to_vec(&AddMemberRequest { peer_urls })
            .map_err(|e| ClusterError::Decode(format!("encode add-member request: {e}")))?;
        self.request(Method::POST, MEMBERS_PATH, Some(body)).await
    }

    async fn remove_member(&self, id: u64) -> ClusterResult<()> {
        let path = format!("{MEMBERS_PATH}/{id}");
        let _removed: Member = self.request(Method::DELETE, &path, None).await?;
        Ok(())
    }
}

/// `Connector` producing `HttpMembershipClient`s.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    dial_timeout: Duration,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self {
            dial_timeout: DIAL_TIMEOUT,
        }
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for HttpConnector {
    type Client = HttpMembershipClient;

    async fn connect(
        &self,
        endpoints: &EndpointSet,
        shutdown: Shutdown,
    ) -> ClusterResult<Option<HttpMembershipClient>> {
        HttpMembershipClient::connect(endpoints, self.dial_timeout, shutdown).await
    }
}
