// ── Sites view ──

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use webctl_admin::{EntityKind, ServerManager};

use crate::command::SerialCommand;
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::gate::ServerGate;
use crate::model::SiteItem;
use crate::stream::{ItemStream, Snapshot};
use crate::view::join_item_reloads;

/// Owns the site collection, its reload coordinator, and the removal
/// channel.
///
/// A confirmed site deletion sends the name through a typed channel
/// owned here (the deleting item never holds a reference to the
/// collection); the removal side drops the matching item -- the only
/// collection mutation outside a wholesale reload.
pub struct SitesView {
    shared: Arc<Shared>,
    reload: SerialCommand,
    removals_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

struct Shared {
    gate: Arc<ServerGate>,
    config: CoreConfig,
    items: watch::Sender<Snapshot<SiteItem>>,
    removals_tx: mpsc::UnboundedSender<String>,
}

impl Shared {
    /// Drop the named item from the snapshot, if present.
    fn remove(&self, name: &str) {
        self.items.send_if_modified(|snap| {
            let kept: Vec<Arc<SiteItem>> = snap
                .iter()
                .filter(|site| site.name() != name)
                .cloned()
                .collect();
            if kept.len() == snap.len() {
                return false;
            }
            debug!(site = %name, remaining = kept.len(), "removed deleted site");
            *snap = Arc::new(kept);
            true
        });
    }
}

impl SitesView {
    pub fn new(gate: Arc<ServerGate>, config: CoreConfig) -> Self {
        let (items, _) = watch::channel(Arc::new(Vec::new()));
        let (removals_tx, removals_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            gate,
            config,
            items,
            removals_tx,
        });
        let reload = SerialCommand::new({
            let shared = Arc::clone(&shared);
            move |cancel| reload_sites(Arc::clone(&shared), cancel)
        });
        Self {
            shared,
            reload,
            removals_rx: Mutex::new(removals_rx),
        }
    }

    /// The collection reload command. Concurrent invocations
    /// serialize; the second runs after the first fully replaced the
    /// collection.
    pub fn reload(&self) -> &SerialCommand {
        &self.reload
    }

    /// Current collection snapshot, ordered by name.
    pub fn snapshot(&self) -> Snapshot<SiteItem> {
        self.shared.items.borrow().clone()
    }

    /// Subscribe to collection changes (reload replacements and
    /// single-item removals).
    pub fn subscribe(&self) -> ItemStream<SiteItem> {
        ItemStream::new(self.shared.items.subscribe())
    }

    /// Look up a site by name in the current snapshot.
    pub fn get(&self, name: &str) -> Option<Arc<SiteItem>> {
        self.snapshot().iter().find(|s| s.name() == name).cloned()
    }

    /// Spawn the background task that consumes deletion notifications
    /// and drops the matching items, until `cancel` fires.
    pub fn spawn_removal_listener(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let view = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx = view.removals_rx.lock().await;
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    name = rx.recv() => {
                        let Some(name) = name else { break };
                        view.shared.remove(&name);
                    }
                }
            }
        })
    }

    /// Synchronously drain pending deletion notifications, for
    /// consumers that poll instead of running the listener task.
    /// Returns the number of items removed.
    pub fn apply_pending_removals(&self) -> usize {
        let Ok(mut rx) = self.removals_rx.try_lock() else {
            // Listener task owns the receiver; it does the removing.
            return 0;
        };
        let mut removed = 0;
        while let Ok(name) = rx.try_recv() {
            self.shared.remove(&name);
            removed += 1;
        }
        removed
    }
}

async fn reload_sites(shared: Arc<Shared>, cancel: CancellationToken) -> Result<(), CoreError> {
    let names = shared
        .gate
        .open(&cancel, async |mgr, _cancel| {
            let mut names = mgr.names(EntityKind::Site)?;
            names.sort_unstable();
            Ok(names)
        })
        .await?;
    debug!(sites = names.len(), "rebuilding site collection");

    let items: Vec<Arc<SiteItem>> = names
        .into_iter()
        .map(|name| {
            Arc::new(SiteItem::new(
                name,
                Arc::clone(&shared.gate),
                shared.config,
                shared.removals_tx.clone(),
            ))
        })
        .collect();

    // Wholesale replacement in one send: no partial collection is
    // ever observable.
    shared.items.send_replace(Arc::new(items.clone()));

    join_item_reloads(items.iter().map(|site| site.reload().execute_with(&cancel))).await
}
