// ── Application pool item ──

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use webctl_admin::{EntityKind, ObjectState, ServerManager};

use crate::command::ItemCommand;
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::gate::ServerGate;
use crate::model::{ItemState, Lifecycle, lifecycle_commands};

/// An application pool as seen by the UI: name, observed flags, and
/// one command per supported operation (start, stop, toggle, recycle,
/// reload). Commands are created once with the item and live as long
/// as it does.
pub struct PoolItem {
    state: Arc<ItemState>,
    lifecycle: Lifecycle,
    recycle: ItemCommand,
}

impl PoolItem {
    pub(crate) fn new(name: impl Into<String>, gate: Arc<ServerGate>, config: CoreConfig) -> Self {
        let state = Arc::new(ItemState::new(name));
        let lifecycle = lifecycle_commands(&state, &gate, EntityKind::Pool, config.poll_interval);

        let recycle = ItemCommand::new(Arc::clone(&state), {
            let state = Arc::clone(&state);
            let gate = Arc::clone(&gate);
            move |cancel| recycle_pool(Arc::clone(&state), Arc::clone(&gate), cancel)
        });

        Self {
            state,
            lifecycle,
            recycle,
        }
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Last confirmed backend running state; `None` until observed.
    pub fn running(&self) -> Option<bool> {
        self.state.running()
    }

    pub fn busy(&self) -> bool {
        self.state.busy()
    }

    pub fn selected(&self) -> bool {
        self.state.selected()
    }

    pub fn watch_running(&self) -> watch::Receiver<Option<bool>> {
        self.state.watch_running()
    }

    pub fn watch_busy(&self) -> watch::Receiver<bool> {
        self.state.watch_busy()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&self) -> &ItemCommand {
        &self.lifecycle.start
    }

    pub fn stop(&self) -> &ItemCommand {
        &self.lifecycle.stop
    }

    pub fn toggle(&self) -> &ItemCommand {
        &self.lifecycle.toggle
    }

    pub fn reload(&self) -> &ItemCommand {
        &self.lifecycle.reload
    }

    pub fn recycle(&self) -> &ItemCommand {
        &self.recycle
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Mark the item selected; kicks a reload when the item is idle.
    pub async fn select(&self) -> Result<(), CoreError> {
        self.state.set_selected(true);
        if !self.state.busy() && !self.reload().is_running() {
            self.reload().execute().await?;
        }
        Ok(())
    }

    /// Clear the selection and cancel an in-flight reload.
    pub fn deselect(&self) {
        self.state.set_selected(false);
        self.reload().cancel();
    }
}

/// Recycle the pool; `running` comes from the terminal state the
/// recycle call itself reports.
async fn recycle_pool(
    state: Arc<ItemState>,
    gate: Arc<ServerGate>,
    cancel: CancellationToken,
) -> Result<(), CoreError> {
    let name = state.name();
    let running = gate
        .open(&cancel, async |mgr, _cancel| {
            Ok(mgr.recycle_pool(name)? == ObjectState::Started)
        })
        .await?;
    debug!(pool = %state.name(), running, "recycle settled");
    state.set_running(running);
    Ok(())
}
