// ── Command machinery ──
//
// `SerialCommand` guarantees at most one concurrent execution of one
// command; `ItemCommand` layers the per-item entity lock and busy
// flag on top. Both expose the running flag through `watch` channels
// for reactive UI binding.

mod item;

use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CoreError;
use crate::sync::lock_or_cancel;

pub use item::ItemCommand;

type CommandOp = dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), CoreError>> + Send + Sync;

/// An asynchronous command that serializes its own invocations.
///
/// A second `execute` while the first is still running blocks on the
/// command lock until the first releases it -- overlapping invocations
/// queue, they never run concurrently and never implicitly cancel each
/// other. Cancellation is cooperative: [`cancel()`](Self::cancel)
/// fires the in-flight run's token and the operation decides when to
/// observe it.
pub struct SerialCommand {
    op: Box<CommandOp>,
    serial: Mutex<()>,
    running: watch::Sender<bool>,
    /// Token of the in-flight (or most recent) run. Swapped in under
    /// the serial lock; `cancel()` reads it lock-free.
    current: ArcSwap<CancellationToken>,
}

impl SerialCommand {
    pub(crate) fn new<F, Fut>(op: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let (running, _) = watch::channel(false);
        Self {
            op: Box::new(move |cancel| op(cancel).boxed()),
            serial: Mutex::new(()),
            running,
            current: ArcSwap::from_pointee(CancellationToken::new()),
        }
    }

    /// Execute with a token owned by this command alone.
    pub async fn execute(&self) -> Result<(), CoreError> {
        self.run(CancellationToken::new()).await
    }

    /// Execute with a run token linked to the caller's: either the
    /// caller's token or this command's own `cancel()` stops the run.
    pub async fn execute_with(&self, cancel: &CancellationToken) -> Result<(), CoreError> {
        self.run(cancel.child_token()).await
    }

    /// Request cooperative cancellation of the in-flight run. Does not
    /// forcibly abort anything.
    pub fn cancel(&self) {
        self.current.load().cancel();
    }

    /// Whether a run of this command is currently in flight.
    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Whether the latest run's token has been cancelled.
    pub fn is_cancellation_requested(&self) -> bool {
        self.current.load().is_cancelled()
    }

    pub fn can_execute(&self) -> bool {
        !self.is_running()
    }

    /// Change notification for the running flag -- the surface UI
    /// layers bind to.
    pub fn watch_running(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    /// The command's own exclusive lock. Composite operations (toggle)
    /// acquire the locks of the commands they stand in for.
    pub(crate) fn serial_lock(&self) -> &Mutex<()> {
        &self.serial
    }

    async fn run(&self, token: CancellationToken) -> Result<(), CoreError> {
        match self.try_run(token).await {
            Err(err) if err.is_cancelled() => {
                // Cancellation is not a failure; observed state stays
                // as last-known and the caller re-reloads if it cares.
                debug!("command run cancelled");
                Ok(())
            }
            result => result,
        }
    }

    async fn try_run(&self, token: CancellationToken) -> Result<(), CoreError> {
        let _serial = lock_or_cancel(&self.serial, &token).await?;
        // Only the run that actually holds the lock becomes the
        // target of cancel(); queued runs keep their own tokens.
        self.current.store(Arc::new(token.clone()));

        let _ = self.running.send(true);
        let result = (self.op)(token).await;
        let _ = self.running.send(false);
        result
    }
}
