use thiserror::Error;

use crate::manager::EntityKind;

/// Failure modes of the administration backend.
///
/// These surface unwrapped through the coordination core -- the
/// command layer never swallows a backend fault.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The named entity is not part of the server configuration.
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    /// Committing staged configuration changes failed.
    #[error("commit failed: {message}")]
    Commit { message: String },

    /// Any other backend fault (the backend's own error text).
    #[error("backend fault: {message}")]
    Backend { message: String },
}

impl AdminError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
