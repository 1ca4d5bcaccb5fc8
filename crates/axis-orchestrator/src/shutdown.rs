//! Orchestrated shutdown: a one-way trigger observed by both loops, and
//! bounded-grace teardown for outstanding background work.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Creates a linked controller/signal pair.
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (tx, rx) = watch::channel(None);
    (ShutdownController { tx }, ShutdownSignal { rx })
}

#[derive(Debug, Clone)]
pub struct ShutdownController {
    tx: watch::Sender<Option<String>>,
}

impl ShutdownController {
    /// Triggers shutdown. Only the first reason is kept.
    pub fn trigger(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let first = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.clone());
            true
        });
        if first {
            tracing::info!(
                reason_code = "shutdown_triggered",
                reason = %reason,
                "orchestrated shutdown triggered"
            );
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Option<String>>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Resolves once shutdown has been triggered. If every controller is
    /// dropped without triggering, this never resolves.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(Option::is_some).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Waits up to `grace` for every handle, then aborts whatever is left.
/// Returns the number of tasks that had to be aborted.
pub async fn join_with_grace<T>(handles: Vec<JoinHandle<T>>, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;
    let mut aborted = 0usize;
    for mut handle in handles {
        if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
            handle.abort();
            aborted = aborted.saturating_add(1);
        }
    }
    aborted
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{join_with_grace, shutdown_channel};

    #[tokio::test]
    async fn unit_first_trigger_reason_is_kept() {
        let (controller, signal) = shutdown_channel();
        assert!(!signal.is_triggered());
        controller.trigger("exit requested");
        controller.trigger("ctrl-c");
        assert!(signal.is_triggered());
        assert_eq!(signal.reason().as_deref(), Some("exit requested"));
    }

    #[tokio::test]
    async fn functional_triggered_resolves_for_late_subscribers() {
        let (controller, _signal) = shutdown_channel();
        controller.trigger("presentation failure");
        let mut late = controller.signal();
        tokio::time::timeout(Duration::from_millis(200), late.triggered())
            .await
            .expect("already triggered");
    }

    #[tokio::test]
    async fn integration_join_with_grace_aborts_stragglers_only() {
        let quick = tokio::spawn(async { 1 });
        let slow = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            2
        });
        let aborted = join_with_grace(vec![quick, slow], Duration::from_millis(50)).await;
        assert_eq!(aborted, 1);
    }
}
