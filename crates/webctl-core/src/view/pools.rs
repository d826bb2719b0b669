// ── Application pools view ──

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use webctl_admin::{EntityKind, ServerManager};

use crate::command::SerialCommand;
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::gate::ServerGate;
use crate::model::PoolItem;
use crate::stream::{ItemStream, Snapshot};
use crate::view::join_item_reloads;

/// Owns the application-pool collection and its reload coordinator.
///
/// The collection is only ever mutated by a reload, and a reload
/// replaces it wholesale -- observers never see a partial collection,
/// and items from before the reload are deliberately orphaned.
pub struct PoolsView {
    shared: Arc<Shared>,
    reload: SerialCommand,
}

struct Shared {
    gate: Arc<ServerGate>,
    config: CoreConfig,
    items: watch::Sender<Snapshot<PoolItem>>,
}

impl PoolsView {
    pub fn new(gate: Arc<ServerGate>, config: CoreConfig) -> Self {
        let (items, _) = watch::channel(Arc::new(Vec::new()));
        let shared = Arc::new(Shared {
            gate,
            config,
            items,
        });
        let reload = SerialCommand::new({
            let shared = Arc::clone(&shared);
            move |cancel| reload_pools(Arc::clone(&shared), cancel)
        });
        Self { shared, reload }
    }

    /// The collection reload command. Concurrent invocations
    /// serialize; the second runs after the first fully replaced the
    /// collection.
    pub fn reload(&self) -> &SerialCommand {
        &self.reload
    }

    /// Current collection snapshot, ordered by name.
    pub fn snapshot(&self) -> Snapshot<PoolItem> {
        self.shared.items.borrow().clone()
    }

    /// Subscribe to collection replacements.
    pub fn subscribe(&self) -> ItemStream<PoolItem> {
        ItemStream::new(self.shared.items.subscribe())
    }

    /// Look up a pool by name in the current snapshot.
    pub fn get(&self, name: &str) -> Option<Arc<PoolItem>> {
        self.snapshot().iter().find(|p| p.name() == name).cloned()
    }
}

async fn reload_pools(shared: Arc<Shared>, cancel: CancellationToken) -> Result<(), CoreError> {
    let names = shared
        .gate
        .open(&cancel, async |mgr, _cancel| {
            let mut names = mgr.names(EntityKind::Pool)?;
            names.sort_unstable();
            Ok(names)
        })
        .await?;
    debug!(pools = names.len(), "rebuilding pool collection");

    let items: Vec<Arc<PoolItem>> = names
        .into_iter()
        .map(|name| {
            Arc::new(PoolItem::new(
                name,
                Arc::clone(&shared.gate),
                shared.config,
            ))
        })
        .collect();

    // Wholesale replacement in one send: no partial collection is
    // ever observable.
    shared.items.send_replace(Arc::new(items.clone()));

    join_item_reloads(items.iter().map(|pool| pool.reload().execute_with(&cancel))).await
}
