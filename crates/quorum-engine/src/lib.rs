//! quorum-engine — the engine a node supervisor starts and stops.
//!
//! # Architecture
//!
//! - **`engine`** — `Engine` / `EngineHandle` traits the supervisor drives
//! - **`embedded`** — `EmbeddedEngine`, an in-process engine that serves
//!   the membership API and keeps the member list on disk
//! - **`api`** — axum routes for `/v1/members` and `/health`
//! - **`store`** — redb-backed member table
//!
//! Replication, logs and snapshots are not implemented here; the embedded
//! engine only owns membership.

pub mod api;
pub mod embedded;
pub mod engine;
pub mod error;
pub mod store;
pub mod tables;

pub use embedded::{EmbeddedEngine, EmbeddedHandle};
pub use engine::{Engine, EngineHandle};
pub use error::{EngineError, EngineResult};
pub use store::MemberStore;
