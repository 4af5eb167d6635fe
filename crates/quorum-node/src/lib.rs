//! quorum-node — lifecycle supervisor for one consensus node.
//!
//! The `Supervisor` walks a node through
//! `Idle → ClientResolving → Joining → Configuring → Starting →
//! WaitingReady → Running → Leaving → Stopped` (or `Failed`), owning the
//! cluster client, the join guard and the engine handle for the duration
//! of one run.

pub mod config;
pub mod error;
pub mod phase;
pub mod supervisor;

pub use config::{DATA_DIR_SUFFIX, build_node_config};
pub use error::{NodeError, NodeResult};
pub use phase::NodePhase;
pub use supervisor::Supervisor;
