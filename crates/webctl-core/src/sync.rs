// ── Cancellation-aware acquisition helpers ──
//
// Every suspension point in the core (lock waits, poll delays) honors
// cancellation through these two helpers. The `biased` select checks
// the token first so an already-cancelled wait never acquires.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// Wait for `lock`, aborting with [`CoreError::Cancelled`] if the
/// token fires first. A cancelled wait leaves the lock untouched.
pub(crate) async fn lock_or_cancel<'a, T>(
    lock: &'a Mutex<T>,
    cancel: &CancellationToken,
) -> Result<MutexGuard<'a, T>, CoreError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CoreError::Cancelled),
        guard = lock.lock() => Ok(guard),
    }
}

/// Sleep for `delay`, aborting with [`CoreError::Cancelled`] if the
/// token fires first.
pub(crate) async fn sleep_or_cancel(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), CoreError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CoreError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_token_aborts_lock_wait() {
        let lock = Mutex::new(());
        let held = lock.lock().await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = lock_or_cancel(&lock, &cancel).await;
        assert!(result.is_err_and(|err| err.is_cancelled()));

        // The lock is still held by the original guard only.
        drop(held);
        assert!(lock.try_lock().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_when_not_cancelled() {
        let cancel = CancellationToken::new();
        sleep_or_cancel(Duration::from_millis(5), &cancel)
            .await
            .unwrap();
    }
}
