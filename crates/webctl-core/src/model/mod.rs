// ── Managed items ──
//
// Observable state holders for the two entity kinds, plus the
// lifecycle operation bodies shared between them. Every operation is
// an accessor run through the resource gate; observed state is only
// updated after the backend confirms it.

mod pool;
mod site;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use webctl_admin::{EntityKind, ObjectState, ServerManager};

use crate::command::ItemCommand;
use crate::error::CoreError;
use crate::gate::ServerGate;
use crate::sync::{lock_or_cancel, sleep_or_cancel};

pub use pool::PoolItem;
pub use site::SiteItem;

/// Observable state shared by all commands of one managed item.
///
/// `running` is tri-state: `None` means the backend state has not been
/// observed (or the last observation was cancelled) -- consumers treat
/// it as "unknown, re-reload". Flags follow single-writer discipline:
/// only the item's own commands write `running` and `busy`; only the
/// UI writes `selected`.
pub(crate) struct ItemState {
    name: String,
    /// Entity-wide lock shared by every command of this item.
    entity_lock: Mutex<()>,
    running: watch::Sender<Option<bool>>,
    busy: watch::Sender<bool>,
    selected: watch::Sender<bool>,
}

impl ItemState {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        let (running, _) = watch::channel(None);
        let (busy, _) = watch::channel(false);
        let (selected, _) = watch::channel(false);
        Self {
            name: name.into(),
            entity_lock: Mutex::new(()),
            running,
            busy,
            selected,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn entity_lock(&self) -> &Mutex<()> {
        &self.entity_lock
    }

    pub(crate) fn running(&self) -> Option<bool> {
        *self.running.borrow()
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.send_replace(Some(running));
    }

    pub(crate) fn busy(&self) -> bool {
        *self.busy.borrow()
    }

    pub(crate) fn set_busy(&self, busy: bool) {
        self.busy.send_replace(busy);
    }

    pub(crate) fn selected(&self) -> bool {
        *self.selected.borrow()
    }

    pub(crate) fn set_selected(&self, selected: bool) {
        self.selected.send_replace(selected);
    }

    pub(crate) fn watch_running(&self) -> watch::Receiver<Option<bool>> {
        self.running.subscribe()
    }

    pub(crate) fn watch_busy(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }
}

// ── Lifecycle operation bodies ───────────────────────────────────────

/// Observe the entity's current state; running means started or on
/// the way there.
async fn reload_entity(
    state: Arc<ItemState>,
    gate: Arc<ServerGate>,
    kind: EntityKind,
    cancel: CancellationToken,
) -> Result<(), CoreError> {
    let name = state.name();
    let running = gate
        .open(&cancel, async |mgr, _cancel| {
            Ok(mgr.state(kind, name)?.is_running())
        })
        .await?;
    state.set_running(running);
    Ok(())
}

/// Start the entity, polling while the backend reports `Starting`.
/// Succeeds immediately -- without issuing a backend start -- when the
/// entity is already started.
async fn start_entity(
    state: Arc<ItemState>,
    gate: Arc<ServerGate>,
    kind: EntityKind,
    poll: Duration,
    cancel: CancellationToken,
) -> Result<(), CoreError> {
    let name = state.name();
    let running = gate
        .open(&cancel, async |mgr, cancel| {
            let mut observed = mgr.state(kind, name)?;
            if observed == ObjectState::Started {
                return Ok(true);
            }

            mgr.start(kind, name)?;
            observed = mgr.state(kind, name)?;
            while observed == ObjectState::Starting {
                sleep_or_cancel(poll, cancel).await?;
                observed = mgr.state(kind, name)?;
            }
            Ok(observed == ObjectState::Started)
        })
        .await?;
    debug!(%kind, name = %state.name(), running, "start settled");
    state.set_running(running);
    Ok(())
}

/// Stop the entity, polling while the backend reports `Stopping`.
/// `running` becomes the negation of "stopped".
async fn stop_entity(
    state: Arc<ItemState>,
    gate: Arc<ServerGate>,
    kind: EntityKind,
    poll: Duration,
    cancel: CancellationToken,
) -> Result<(), CoreError> {
    let name = state.name();
    let stopped = gate
        .open(&cancel, async |mgr, cancel| {
            let mut observed = mgr.state(kind, name)?;
            if observed == ObjectState::Stopped {
                return Ok(true);
            }

            mgr.stop(kind, name)?;
            observed = mgr.state(kind, name)?;
            while observed == ObjectState::Stopping {
                sleep_or_cancel(poll, cancel).await?;
                observed = mgr.state(kind, name)?;
            }
            Ok(observed == ObjectState::Stopped)
        })
        .await?;
    debug!(%kind, name = %state.name(), stopped, "stop settled");
    state.set_running(!stopped);
    Ok(())
}

/// Dispatch to start or stop based on the last observed running state.
///
/// Holds both the start command's and the stop command's serial locks
/// (in that fixed order, so composite acquisition can never invert)
/// before dispatching, which keeps a toggle from racing an independent
/// start or stop on the same item.
async fn toggle_entity(
    state: Arc<ItemState>,
    gate: Arc<ServerGate>,
    kind: EntityKind,
    poll: Duration,
    start: Arc<ItemCommand>,
    stop: Arc<ItemCommand>,
    cancel: CancellationToken,
) -> Result<(), CoreError> {
    let _start_lock = lock_or_cancel(start.serial_lock(), &cancel).await?;
    let _stop_lock = lock_or_cancel(stop.serial_lock(), &cancel).await?;

    if state.running().unwrap_or(false) {
        stop_entity(state, gate, kind, poll, cancel).await
    } else {
        start_entity(state, gate, kind, poll, cancel).await
    }
}

// ── Command assembly ─────────────────────────────────────────────────

/// The lifecycle commands common to both entity kinds.
pub(crate) struct Lifecycle {
    pub(crate) start: Arc<ItemCommand>,
    pub(crate) stop: Arc<ItemCommand>,
    pub(crate) toggle: ItemCommand,
    pub(crate) reload: ItemCommand,
}

pub(crate) fn lifecycle_commands(
    state: &Arc<ItemState>,
    gate: &Arc<ServerGate>,
    kind: EntityKind,
    poll: Duration,
) -> Lifecycle {
    let start = Arc::new(ItemCommand::new(Arc::clone(state), {
        let state = Arc::clone(state);
        let gate = Arc::clone(gate);
        move |cancel| start_entity(Arc::clone(&state), Arc::clone(&gate), kind, poll, cancel)
    }));

    let stop = Arc::new(ItemCommand::new(Arc::clone(state), {
        let state = Arc::clone(state);
        let gate = Arc::clone(gate);
        move |cancel| stop_entity(Arc::clone(&state), Arc::clone(&gate), kind, poll, cancel)
    }));

    let toggle = ItemCommand::new(Arc::clone(state), {
        let state = Arc::clone(state);
        let gate = Arc::clone(gate);
        let start = Arc::clone(&start);
        let stop = Arc::clone(&stop);
        move |cancel| {
            toggle_entity(
                Arc::clone(&state),
                Arc::clone(&gate),
                kind,
                poll,
                Arc::clone(&start),
                Arc::clone(&stop),
                cancel,
            )
        }
    });

    let reload = ItemCommand::new(Arc::clone(state), {
        let state = Arc::clone(state);
        let gate = Arc::clone(gate);
        move |cancel| reload_entity(Arc::clone(&state), Arc::clone(&gate), kind, cancel)
    });

    Lifecycle {
        start,
        stop,
        toggle,
        reload,
    }
}
