//! The engine contract the node supervisor drives.

use std::future::Future;

use quorum_core::NodeConfig;

use crate::error::EngineResult;

/// Something that can start one consensus engine instance from a
/// `NodeConfig`.
pub trait Engine: Send + Sync {
    type Handle: EngineHandle;

    /// Start the engine. Resolves once the instance is launched, not once it
    /// is ready to serve; use `EngineHandle::ready` for that.
    fn start(&self, config: NodeConfig)
    -> impl Future<Output = EngineResult<Self::Handle>> + Send;
}

/// A running engine instance.
pub trait EngineHandle: Send + 'static {
    /// Resolve once the engine is ready to serve clients. An error means the
    /// engine terminated before becoming ready. Callers bound the wait with
    /// their own timeout.
    fn ready(&mut self) -> impl Future<Output = EngineResult<()>> + Send;

    /// Stop the engine and release its resources. Safe to call before
    /// `ready` has resolved.
    fn stop(self) -> impl Future<Output = ()> + Send;
}
