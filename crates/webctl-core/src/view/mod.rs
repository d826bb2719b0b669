// ── Collection views ──
//
// Reload coordinators for the two entity collections. A reload is
// itself a serialized command: fetch the sorted name set inside the
// gate, replace the collection wholesale, then fan out per-item
// reloads and join on completion.

mod pools;
mod sites;

use futures_util::future::join_all;
use tracing::warn;

use crate::error::CoreError;

pub use pools::PoolsView;
pub use sites::SitesView;

/// Await every item reload; a single failure never aborts siblings.
/// The first error observed after all of them settle is surfaced as
/// the aggregate outcome.
async fn join_item_reloads<I, F>(reloads: I) -> Result<(), CoreError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<(), CoreError>>,
{
    let results = join_all(reloads).await;
    let total = results.len();
    let mut failures = results.into_iter().filter_map(Result::err);

    match failures.next() {
        None => Ok(()),
        Some(first) => {
            let failed = 1 + failures.count();
            warn!(failed, total, error = %first, "item reloads failed");
            Err(CoreError::Reload {
                failed,
                first: Box::new(first),
            })
        }
    }
}
