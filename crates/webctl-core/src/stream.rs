// ── Collection subscriptions ──

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A complete, name-ordered snapshot of a view's collection. Views
/// only ever publish whole snapshots; a subscriber can never observe
/// a partially built collection.
pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// A subscription to a view's collection.
///
/// Wraps the view's `watch` channel: [`latest()`](Self::latest) reads
/// the newest snapshot without consuming the change,
/// [`changed()`](Self::changed) awaits the next replacement, and
/// [`into_stream()`](Self::into_stream) converts to a `Stream` for
/// combinator-style consumers.
pub struct ItemStream<T> {
    receiver: watch::Receiver<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> ItemStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot<T>>) -> Self {
        Self { receiver }
    }

    /// The newest published snapshot. Does not mark it seen: a
    /// subsequent [`changed()`](Self::changed) still yields it if it
    /// arrived after the last one consumed.
    pub fn latest(&self) -> Snapshot<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next collection replacement (or removal) and
    /// return the new snapshot. Returns `None` once the owning view
    /// has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Convert into a `Stream` that yields the current snapshot
    /// immediately and every replacement after it.
    pub fn into_stream(self) -> WatchStream<Snapshot<T>> {
        WatchStream::new(self.receiver)
    }
}
