// ── Busy-tracking entity command ──
//
// A `SerialCommand` variant for commands that belong to a managed
// item. The operation body only runs under the item's entity-wide
// lock, so start/stop/recycle/reload on the same item never
// interleave, and the item's busy flag brackets the body.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::command::SerialCommand;
use crate::error::CoreError;
use crate::model::ItemState;
use crate::sync::lock_or_cancel;

/// A command owned by one managed item.
///
/// Execution order: acquire this command's own serial lock, then the
/// owning item's entity lock, then set `busy`, run the body, clear
/// `busy` on every outcome including failure.
///
/// `is_running` reflects the body only -- a queued invocation waiting
/// on either lock is not "running", which is what makes "at most one
/// of an item's commands runs at any instant" observable.
pub struct ItemCommand {
    inner: SerialCommand,
    running: Arc<watch::Sender<bool>>,
}

impl ItemCommand {
    pub(crate) fn new<F, Fut>(state: Arc<ItemState>, op: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let (running, _) = watch::channel(false);
        let running = Arc::new(running);
        let op = Arc::new(op);

        let inner = SerialCommand::new({
            let running = Arc::clone(&running);
            move |cancel: CancellationToken| {
                let state = Arc::clone(&state);
                let running = Arc::clone(&running);
                let op = Arc::clone(&op);
                async move {
                    let _entity = lock_or_cancel(state.entity_lock(), &cancel).await?;
                    state.set_busy(true);
                    let _ = running.send(true);

                    let result = op(cancel).await;

                    let _ = running.send(false);
                    state.set_busy(false);
                    result
                }
            }
        });

        Self { inner, running }
    }

    pub async fn execute(&self) -> Result<(), CoreError> {
        self.inner.execute().await
    }

    pub async fn execute_with(&self, cancel: &CancellationToken) -> Result<(), CoreError> {
        self.inner.execute_with(cancel).await
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether this command's body is executing right now.
    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.is_cancellation_requested()
    }

    /// Whether an invocation would start immediately rather than queue.
    pub fn can_execute(&self) -> bool {
        self.inner.can_execute()
    }

    /// Change notification for the body-running flag.
    pub fn watch_running(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    /// This command's serial lock, for composite operations that
    /// dispatch to the underlying operation body directly.
    pub(crate) fn serial_lock(&self) -> &Mutex<()> {
        self.inner.serial_lock()
    }
}
