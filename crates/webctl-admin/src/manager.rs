// ── Administration handle contract ──
//
// The `ServerManager` trait is the only way the coordination core
// reads or mutates server configuration. Implementations are free to
// talk to a real server; `LocalServerManager` simulates one in memory.

use crate::error::AdminError;

/// Lifecycle state of a managed entity, as reported by the backend.
///
/// `Starting` and `Stopping` are transitional: this layer never sets
/// them, it only observes them via polling until they settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ObjectState {
    Stopped,
    Starting,
    Started,
    Stopping,
    /// The backend could not determine a state.
    Unknown,
}

impl ObjectState {
    /// Whether the state counts as "running" for UI purposes:
    /// already started, or on its way there.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Started)
    }

    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }
}

/// The two kinds of managed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum EntityKind {
    #[strum(serialize = "application pool")]
    Pool,
    #[strum(serialize = "site")]
    Site,
}

/// The opaque administration handle.
///
/// Every method takes `&mut self`: the handle is owned by the
/// resource gate and only ever accessed under its exclusive lock, so
/// implementations need no internal synchronization.
///
/// `start`/`stop` trigger a transition; the outcome is observed
/// through subsequent `state()` calls. `delete_site` only stages the
/// removal -- it takes effect at `commit()`, and callers verify with
/// `exists()` afterwards (a missing site is not an error here; the
/// confirmation check decides).
pub trait ServerManager: Send {
    /// Enumerate entity names of one kind. Order is unspecified.
    fn names(&mut self, kind: EntityKind) -> Result<Vec<String>, AdminError>;

    /// Current state of the named entity.
    fn state(&mut self, kind: EntityKind, name: &str) -> Result<ObjectState, AdminError>;

    /// Trigger a start. No-op if already started.
    fn start(&mut self, kind: EntityKind, name: &str) -> Result<(), AdminError>;

    /// Trigger a stop. No-op if already stopped.
    fn stop(&mut self, kind: EntityKind, name: &str) -> Result<(), AdminError>;

    /// Recycle an application pool, returning its terminal state.
    fn recycle_pool(&mut self, name: &str) -> Result<ObjectState, AdminError>;

    /// Stage removal of a site. Staging a site that is already gone
    /// succeeds -- `exists()` after `commit()` is the confirmation.
    fn delete_site(&mut self, name: &str) -> Result<(), AdminError>;

    /// Whether the named entity exists in the committed configuration.
    fn exists(&mut self, kind: EntityKind, name: &str) -> Result<bool, AdminError>;

    /// Apply staged configuration changes.
    fn commit(&mut self) -> Result<(), AdminError>;
}
