//! Run-wide cancellation signal.
//!
//! One `watch` channel per process: the sender flips to `true` on an
//! operator interrupt, every service holds a receiver.

use tokio::sync::watch;

/// Receiving side of the shared shutdown signal.
pub type Shutdown = watch::Receiver<bool>;

/// Resolve once shutdown has been requested. A dropped sender counts as a
/// shutdown request since nothing can signal afterwards.
pub async fn wait_for_shutdown(shutdown: &mut Shutdown) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
