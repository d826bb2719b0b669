// ── Coordination tuning ──
//
// Built by the embedding application and handed to the views; the
// core never reads config files.

use std::time::Duration;

/// Tuning knobs for the coordination core.
#[derive(Debug, Clone, Copy)]
pub struct CoreConfig {
    /// Delay between observations of a transitional state
    /// (`Starting`/`Stopping`) during start and stop operations.
    ///
    /// The backend clears transitional states quickly, so the default
    /// favors responsiveness. Tunable, not a contract.
    pub poll_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
        }
    }
}
