//! Service group and process signals.
//!
//! Every long-running unit of the daemon is spawned into one
//! `ServiceGroup`. Waiting on the group is the shutdown barrier: it
//! resolves once every service has finished, whether it returned, failed
//! or panicked, and each failure is reported on its own.

use std::collections::HashMap;
use std::future::Future;

use tokio::task::{Id, JoinSet};
use tracing::{error, info};

#[derive(Default)]
pub struct ServiceGroup {
    tasks: JoinSet<anyhow::Result<()>>,
    names: HashMap<Id, String>,
}

impl ServiceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: impl Into<String>, service: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        let handle = self.tasks.spawn(service);
        info!(service = %name, "service started");
        self.names.insert(handle.id(), name);
    }

    fn name(&self, id: Id) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or("unknown")
    }

    /// Wait for every service to finish. Returns how many failed.
    pub async fn wait(mut self) -> usize {
        let mut failed = 0;
        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, Ok(()))) => info!(service = self.name(id), "service finished"),
                Ok((id, Err(e))) => {
                    failed += 1;
                    error!(service = self.name(id), error = %format!("{e:#}"), "service failed");
                }
                Err(e) => {
                    failed += 1;
                    error!(service = self.name(e.id()), error = %e, "service panicked");
                }
            }
        }
        failed
    }
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_failed_services_independently() {
        let mut group = ServiceGroup::new();
        group.spawn("ok", async { Ok(()) });
        group.spawn("err", async { Err(anyhow::anyhow!("boom")) });
        group.spawn("panic", async {
            panic!("service blew up");
        });

        assert_eq!(group.wait().await, 2);
    }

    #[tokio::test]
    async fn empty_group_finishes_immediately() {
        assert_eq!(ServiceGroup::new().wait().await, 0);
    }
}
