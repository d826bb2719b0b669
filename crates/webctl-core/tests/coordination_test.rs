// Integration tests for the command-coordination core, driven through
// the in-memory administration backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use webctl_admin::{EntityKind, LocalServerManager, ObjectState, ServerManager, SharedServerManager};
use webctl_core::{CoreConfig, CoreError, PoolsView, ServerGate, SitesView};

// ── Fixtures ────────────────────────────────────────────────────────

fn pools_fixture(
    mgr: LocalServerManager,
    config: CoreConfig,
) -> (Arc<PoolsView>, Arc<ServerGate>, SharedServerManager) {
    let shared = SharedServerManager::new(mgr);
    let gate = Arc::new(ServerGate::new(shared.clone()));
    let view = Arc::new(PoolsView::new(Arc::clone(&gate), config));
    (view, gate, shared)
}

fn sites_fixture(
    mgr: LocalServerManager,
    config: CoreConfig,
) -> (Arc<SitesView>, Arc<ServerGate>, SharedServerManager) {
    let shared = SharedServerManager::new(mgr);
    let gate = Arc::new(ServerGate::new(shared.clone()));
    let view = Arc::new(SitesView::new(Arc::clone(&gate), config));
    (view, gate, shared)
}

fn names_of(view: &PoolsView) -> Vec<String> {
    view.snapshot().iter().map(|p| p.name().to_owned()).collect()
}

// ── Collection reload ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reload_orders_pools_by_name() {
    let mgr = LocalServerManager::new()
        .with_pool("b", ObjectState::Started)
        .with_pool("a", ObjectState::Stopped)
        .with_pool("c", ObjectState::Starting);
    let (view, _gate, _shared) = pools_fixture(mgr, CoreConfig::default());

    view.reload().execute().await.unwrap();

    assert_eq!(names_of(&view), ["a", "b", "c"]);
    let snap = view.snapshot();
    assert_eq!(snap[0].running(), Some(false));
    assert_eq!(snap[1].running(), Some(true));
    // Starting counts as running.
    assert_eq!(snap[2].running(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn concurrent_reloads_never_expose_a_partial_collection() {
    let mgr = LocalServerManager::new()
        .with_pool("a", ObjectState::Started)
        .with_pool("b", ObjectState::Started)
        .with_pool("c", ObjectState::Started);
    let (view, _gate, _shared) = pools_fixture(mgr, CoreConfig::default());

    let mut stream = view.subscribe();
    let stop = CancellationToken::new();
    let probe = tokio::spawn({
        let stop = stop.clone();
        async move {
            let mut lens = Vec::new();
            loop {
                tokio::select! {
                    () = stop.cancelled() => break,
                    snap = stream.changed() => {
                        let Some(snap) = snap else { break };
                        lens.push(snap.len());
                    }
                }
            }
            lens
        }
    });

    let first = tokio::spawn({
        let view = Arc::clone(&view);
        async move { view.reload().execute().await }
    });
    let second = tokio::spawn({
        let view = Arc::clone(&view);
        async move { view.reload().execute().await }
    });
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    stop.cancel();
    let lens = probe.await.unwrap();
    assert!(!lens.is_empty());
    // Every observed snapshot is complete: wholesale replacement only.
    assert!(lens.iter().all(|&len| len == 3), "partial snapshot: {lens:?}");
    assert_eq!(view.snapshot().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn one_failing_item_reload_does_not_abort_siblings() {
    let mgr = LocalServerManager::new()
        .with_site("a", ObjectState::Started)
        .with_site("b", ObjectState::Started)
        .with_site("c", ObjectState::Stopped);
    let (view, _gate, shared) = sites_fixture(mgr, CoreConfig::default());
    shared.with(|m| m.fail_state_for("b"));

    let err = view.reload().execute().await.unwrap_err();
    assert!(matches!(err, CoreError::Reload { failed: 1, .. }));

    // Siblings completed: collection is full, their state observed.
    let snap = view.snapshot();
    assert_eq!(snap.len(), 3);
    assert_eq!(snap[0].running(), Some(true));
    assert_eq!(snap[1].running(), None); // never observed
    assert_eq!(snap[2].running(), Some(false));
}

// ── Lifecycle operations ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_on_started_pool_issues_no_backend_start() {
    let mgr = LocalServerManager::new().with_pool("app", ObjectState::Started);
    let (view, _gate, shared) = pools_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();

    let pool = view.get("app").unwrap();
    pool.start().execute().await.unwrap();

    assert_eq!(pool.running(), Some(true));
    assert_eq!(shared.with(|m| m.start_calls(EntityKind::Pool, "app")), 0);
}

#[tokio::test(start_paused = true)]
async fn start_polls_transitional_state_to_completion() {
    let mgr = LocalServerManager::new()
        .with_pool("app", ObjectState::Stopped)
        .transition_observations(3);
    let (view, _gate, shared) = pools_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();

    let pool = view.get("app").unwrap();
    pool.start().execute().await.unwrap();

    assert_eq!(pool.running(), Some(true));
    assert_eq!(shared.with(|m| m.start_calls(EntityKind::Pool, "app")), 1);
    assert_eq!(
        shared.with(|m| m.peek_state(EntityKind::Pool, "app")),
        Some(ObjectState::Started)
    );
}

#[tokio::test(start_paused = true)]
async fn stop_sets_running_to_negated_stopped() {
    let mgr = LocalServerManager::new()
        .with_pool("app", ObjectState::Started)
        .transition_observations(2);
    let (view, _gate, shared) = pools_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();

    let pool = view.get("app").unwrap();
    pool.stop().execute().await.unwrap();

    assert_eq!(pool.running(), Some(false));
    assert_eq!(shared.with(|m| m.stop_calls(EntityKind::Pool, "app")), 1);
}

#[tokio::test(start_paused = true)]
async fn recycle_takes_running_from_terminal_state() {
    let mgr = LocalServerManager::new().with_pool("app", ObjectState::Stopped);
    let (view, _gate, shared) = pools_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();

    let pool = view.get("app").unwrap();
    pool.recycle().execute().await.unwrap();

    assert_eq!(pool.running(), Some(true));
    assert_eq!(shared.with(|m| m.recycle_calls("app")), 1);
}

#[tokio::test(start_paused = true)]
async fn toggle_dispatches_on_observed_state() {
    let mgr = LocalServerManager::new()
        .with_site("store", ObjectState::Stopped)
        .transition_observations(1);
    let (view, _gate, shared) = sites_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();

    let site = view.get("store").unwrap();
    assert_eq!(site.running(), Some(false));

    // Not running: toggle starts, exactly once, never a concurrent stop.
    site.toggle().execute().await.unwrap();
    assert_eq!(site.running(), Some(true));
    assert_eq!(shared.with(|m| m.start_calls(EntityKind::Site, "store")), 1);
    assert_eq!(shared.with(|m| m.stop_calls(EntityKind::Site, "store")), 0);

    // Running: toggle stops.
    site.toggle().execute().await.unwrap();
    assert_eq!(site.running(), Some(false));
    assert_eq!(shared.with(|m| m.stop_calls(EntityKind::Site, "store")), 1);
}

// ── Entity-lock exclusivity ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn at_most_one_item_command_runs_at_any_instant() {
    let mgr = LocalServerManager::new()
        .with_pool("app", ObjectState::Stopped)
        .transition_observations(20);
    let config = CoreConfig {
        poll_interval: Duration::from_millis(10),
    };
    let (view, _gate, _shared) = pools_fixture(mgr, config);
    view.reload().execute().await.unwrap();
    let pool = view.get("app").unwrap();

    let start_task = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.start().execute().await }
    });
    let mut start_running = pool.start().watch_running();
    start_running.wait_for(|r| *r).await.unwrap();

    let reload_task = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.reload().execute().await }
    });

    // While the start body runs, the queued reload's body must not.
    for _ in 0..16 {
        if !*start_running.borrow() {
            break;
        }
        assert!(!pool.reload().is_running());
        assert!(pool.busy());
        tokio::task::yield_now().await;
    }

    start_task.await.unwrap().unwrap();
    reload_task.await.unwrap().unwrap();
    assert_eq!(pool.running(), Some(true));
    assert!(!pool.busy());
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_while_awaiting_gate_leaks_nothing() {
    let mgr = LocalServerManager::new().with_pool("app", ObjectState::Stopped);
    let (view, gate, shared) = pools_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();
    let pool = view.get("app").unwrap();

    // Occupy the gate until released.
    let (entered_tx, entered_rx) = oneshot::channel::<()>();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let holder = tokio::spawn({
        let gate = Arc::clone(&gate);
        async move {
            gate.open(&CancellationToken::new(), async move |_mgr, _cancel| {
                let _ = entered_tx.send(());
                let _ = release_rx.await;
                Ok(())
            })
            .await
        }
    });
    entered_rx.await.unwrap();

    // Start queues behind the gate; cancel it while it waits.
    let external = CancellationToken::new();
    let exec = tokio::spawn({
        let pool = Arc::clone(&pool);
        let external = external.clone();
        async move { pool.start().execute_with(&external).await }
    });
    let mut running = pool.start().watch_running();
    running.wait_for(|r| *r).await.unwrap();

    external.cancel();
    exec.await.unwrap().unwrap(); // cancellation is a clean completion

    assert!(!pool.start().is_running());
    assert!(!pool.busy());
    // The backend never saw a start; observed state is last-known.
    assert_eq!(shared.with(|m| m.start_calls(EntityKind::Pool, "app")), 0);
    assert_eq!(pool.running(), Some(false));

    release_tx.send(()).unwrap();
    holder.await.unwrap().unwrap();

    // No leaked lock: the gate is immediately usable.
    gate.open(&CancellationToken::new(), async |_mgr, _cancel| Ok(()))
        .await
        .unwrap();
}

// ── Deletion flow ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn confirmed_delete_removes_site_from_collection() {
    let mgr = LocalServerManager::new()
        .with_site("alpha", ObjectState::Stopped)
        .with_site("beta", ObjectState::Started);
    let (view, _gate, shared) = sites_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();

    let cancel = CancellationToken::new();
    let listener = view.spawn_removal_listener(cancel.clone());

    let mut stream = view.subscribe();
    let alpha = view.get("alpha").unwrap();
    alpha.delete().execute().await.unwrap();

    // The listener drops the item; observers see one fewer site.
    let snap = stream.changed().await.unwrap();
    assert_eq!(snap.len(), 1);
    assert!(!snap.iter().any(|s| s.name() == "alpha"));

    assert!(!shared.with(|m| m.exists(EntityKind::Site, "alpha").unwrap()));
    assert_eq!(shared.with(|m| m.commit_calls()), 1);

    cancel.cancel();
    listener.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn delete_of_already_missing_site_confirms_and_notifies() {
    let mgr = LocalServerManager::new().with_site("alpha", ObjectState::Stopped);
    let (view, _gate, shared) = sites_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();
    let alpha = view.get("alpha").unwrap();

    // The backend loses the site out from under us.
    shared.with(|m| {
        m.delete_site("alpha").unwrap();
        m.commit().unwrap();
    });

    // The exists-check decides: absence is success, not an error.
    assert_ok!(alpha.delete().execute().await);
    assert_eq!(view.apply_pending_removals(), 1);
    assert!(view.snapshot().is_empty());
}

// ── Selection ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn select_reloads_idle_item_and_deselect_clears() {
    let mgr = LocalServerManager::new().with_pool("app", ObjectState::Started);
    let (view, _gate, _shared) = pools_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();
    let pool = view.get("app").unwrap();

    assert_ok!(pool.select().await);
    assert!(pool.selected());
    assert_eq!(pool.running(), Some(true));

    pool.deselect();
    assert!(!pool.selected());
}

#[tokio::test]
async fn deselect_cancels_in_flight_reload() {
    let mgr = LocalServerManager::new().with_pool("app", ObjectState::Started);
    let (view, gate, _shared) = pools_fixture(mgr, CoreConfig::default());
    view.reload().execute().await.unwrap();
    let pool = view.get("app").unwrap();
    assert_eq!(pool.running(), Some(true));

    // Occupy the gate so the reload parks on it.
    let (entered_tx, entered_rx) = oneshot::channel::<()>();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let holder = tokio::spawn({
        let gate = Arc::clone(&gate);
        async move {
            gate.open(&CancellationToken::new(), async move |_mgr, _cancel| {
                let _ = entered_tx.send(());
                let _ = release_rx.await;
                Ok(())
            })
            .await
        }
    });
    entered_rx.await.unwrap();

    let reload = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.reload().execute().await }
    });
    let mut running = pool.reload().watch_running();
    running.wait_for(|r| *r).await.unwrap();

    // Deselecting cancels the parked reload; it completes cleanly and
    // leaves the last-known state untouched.
    pool.deselect();
    assert_ok!(reload.await.unwrap());
    assert!(!pool.selected());
    assert!(!pool.reload().is_running());
    assert!(!pool.busy());
    assert_eq!(pool.running(), Some(true));

    release_tx.send(()).unwrap();
    holder.await.unwrap().unwrap();
}
