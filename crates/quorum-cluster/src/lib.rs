//! quorum-cluster — membership bootstrap against an existing cluster.
//!
//! # Architecture
//!
//! ```text
//! Connector::connect(cluster client endpoints)
//!   └── Option<MembershipClient>      (None = bootstrap a new cluster)
//!         ├── registrar::join()       → JoinGuard (leave on shutdown)
//!         └── resolver::resolve()     → ClusterDescriptor
//! ```
//!
//! `HttpMembershipClient` talks to the membership API served by every
//! running node. `InMemoryCluster` implements the same traits without a
//! network, for tests and embedding.

pub mod client;
pub mod error;
pub mod http_client;
pub mod memory;
pub mod registrar;
pub mod resolver;

pub use client::{Connector, DIAL_TIMEOUT, MembershipClient};
pub use error::{ClusterError, ClusterResult};
pub use http_client::{HttpConnector, HttpMembershipClient};
pub use memory::{InMemoryCluster, InMemoryConnector, Operation};
pub use registrar::{JoinGuard, join};
pub use resolver::{render_initial_cluster, resolve};
