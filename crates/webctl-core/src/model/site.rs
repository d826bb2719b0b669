// ── Site item ──

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use webctl_admin::{EntityKind, ServerManager};

use crate::command::ItemCommand;
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::gate::ServerGate;
use crate::model::{ItemState, Lifecycle, lifecycle_commands};

/// A site as seen by the UI: name, observed flags, and one command per
/// supported operation (start, stop, toggle, reload, delete).
pub struct SiteItem {
    state: Arc<ItemState>,
    lifecycle: Lifecycle,
    delete: ItemCommand,
}

impl SiteItem {
    pub(crate) fn new(
        name: impl Into<String>,
        gate: Arc<ServerGate>,
        config: CoreConfig,
        removals: mpsc::UnboundedSender<String>,
    ) -> Self {
        let state = Arc::new(ItemState::new(name));
        let lifecycle = lifecycle_commands(&state, &gate, EntityKind::Site, config.poll_interval);

        let delete = ItemCommand::new(Arc::clone(&state), {
            let state = Arc::clone(&state);
            let gate = Arc::clone(&gate);
            move |cancel| {
                delete_site(
                    Arc::clone(&state),
                    Arc::clone(&gate),
                    removals.clone(),
                    cancel,
                )
            }
        });

        Self {
            state,
            lifecycle,
            delete,
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

    pub fn delete(&self) -> &ItemCommand {
        &self.delete
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

/// Remove the site from the backend, commit, and verify absence.
///
/// The post-commit existence check decides the outcome: a confirmed
/// absence emits a removal notification for the owning collection; a
/// site that survived its own delete is [`CoreError::DeleteFailed`].
async fn delete_site(
    state: Arc<ItemState>,
    gate: Arc<ServerGate>,
    removals: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) -> Result<(), CoreError> {
    let name = state.name();
    let gone = gate
        .open(&cancel, async |mgr, _cancel| {
            mgr.delete_site(name)?;
            mgr.commit()?;
            Ok(!mgr.exists(EntityKind::Site, name)?)
        })
        .await?;

    if gone {
        debug!(site = %state.name(), "delete confirmed");
        let _ = removals.send(state.name().to_owned());
        Ok(())
    } else {
        Err(CoreError::DeleteFailed {
            name: state.name().to_owned(),
        })
    }
}
