// ── Core error types ──
//
// Errors surfaced by the coordination layer. Backend faults pass
// through unwrapped (`Admin`); cancellation is a control-flow signal
// that command execution converts back into a clean completion.

use thiserror::Error;

use webctl_admin::AdminError;

/// Unified error type for the coordination core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The operation was cancelled while waiting for a lock or while
    /// polling a transitional state. Not a failure: command execution
    /// swallows this variant and leaves observed state as last-known.
    #[error("operation cancelled")]
    Cancelled,

    /// A backend fault, propagated unwrapped from the accessor.
    #[error(transparent)]
    Admin(#[from] AdminError),

    /// A site survived its own delete transaction. The post-commit
    /// existence check decides this, not a thrown not-found.
    #[error("site still present after delete: {name}")]
    DeleteFailed { name: String },

    /// One or more item reloads failed during a collection reload.
    /// Sibling reloads ran to completion regardless; `first` is the
    /// first failure observed after all of them settled.
    #[error("reload failed for {failed} item(s)")]
    Reload {
        failed: usize,
        #[source]
        first: Box<CoreError>,
    },
}

impl CoreError {
    /// Whether this error is the cooperative-cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
