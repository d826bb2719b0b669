// ── Exclusive resource gate ──
//
// The single mutual-exclusion point for backend access. The gate owns
// the administration handle outright; the handle is never visible
// outside an `open()` accessor, so at most one backend transaction is
// in flight system-wide.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use webctl_admin::ServerManager;

use crate::error::CoreError;
use crate::sync::lock_or_cancel;

/// Serializes all access to the shared [`ServerManager`] handle.
///
/// `open()` waits for the internal lock (honoring cancellation while
/// waiting), runs the accessor against the handle, and releases on
/// every exit path via guard drop. Accessor errors propagate to the
/// caller unwrapped; the gate never retries.
pub struct ServerGate {
    manager: Mutex<Box<dyn ServerManager>>,
}

impl ServerGate {
    pub fn new(manager: impl ServerManager + 'static) -> Self {
        Self {
            manager: Mutex::new(Box::new(manager)),
        }
    }

    /// Run `accessor` with exclusive access to the administration
    /// handle.
    ///
    /// Cancellation is honored while waiting for the gate; once the
    /// accessor is running, cancellation is cooperative -- the token is
    /// passed through and the accessor decides when to observe it. A
    /// backend call already issued is assumed to complete.
    ///
    /// Accessors that stage configuration changes commit them
    /// themselves before returning.
    pub async fn open<T, F>(&self, cancel: &CancellationToken, accessor: F) -> Result<T, CoreError>
    where
        F: AsyncFnOnce(&mut Box<dyn ServerManager>, &CancellationToken) -> Result<T, CoreError>,
    {
        let mut guard = match lock_or_cancel(&self.manager, cancel).await {
            Ok(guard) => guard,
            Err(err) => {
                debug!("gate wait cancelled");
                return Err(err);
            }
        };
        accessor(&mut *guard, cancel).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    use webctl_admin::LocalServerManager;

    use super::*;

    fn empty_gate() -> Arc<ServerGate> {
        Arc::new(ServerGate::new(LocalServerManager::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn accessors_never_interleave() {
        let gate = empty_gate();
        let log: Arc<StdMutex<Vec<&'static str>>> = Arc::default();

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            let log = Arc::clone(&log);
            tasks.push(tokio::spawn(async move {
                gate.open(&CancellationToken::new(), async |_mgr, _cancel| {
                    log.lock().unwrap().push("enter");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    log.lock().unwrap().push("exit");
                    Ok(())
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 6);
        // Strict enter/exit alternation: one accessor at a time.
        for pair in log.chunks(2) {
            assert_eq!(pair, ["enter", "exit"]);
        }
    }

    #[tokio::test]
    async fn cancelled_wait_leaves_gate_unheld() {
        let gate = empty_gate();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        // Occupy the gate until released.
        let holder = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move {
                gate.open(&CancellationToken::new(), async move |_mgr, _cancel| {
                    let _ = release_rx.await;
                    Ok(())
                })
                .await
            }
        });
        tokio::task::yield_now().await;

        // A cancelled waiter aborts without ever entering.
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let result: Result<(), CoreError> = gate
            .open(&cancelled, async |_mgr, _cancel| Ok(()))
            .await;
        assert!(matches!(result, Err(CoreError::Cancelled)));

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();

        // The gate is immediately usable again.
        gate.open(&CancellationToken::new(), async |_mgr, _cancel| Ok(()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn accessor_error_propagates_and_releases() {
        let gate = empty_gate();

        let result: Result<(), CoreError> = gate
            .open(&CancellationToken::new(), async |mgr, _cancel| {
                // Querying a missing entity surfaces the backend error.
                mgr.state(webctl_admin::EntityKind::Pool, "missing")?;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CoreError::Admin(_))));

        gate.open(&CancellationToken::new(), async |_mgr, _cancel| Ok(()))
            .await
            .unwrap();
    }
}
