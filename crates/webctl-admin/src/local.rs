// ── In-memory administration backend ──
//
// Simulates a server configuration with entity lifecycle transitions,
// staged site deletion, and fault injection. Used by tests and local
// development; the coordination core only sees the `ServerManager`
// trait.

use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::AdminError;
use crate::manager::{EntityKind, ObjectState, ServerManager};

/// How many `state()` observations a transitional state survives
/// before settling, unless overridden.
const DEFAULT_TRANSITION_OBSERVATIONS: u32 = 2;

#[derive(Debug, Clone)]
struct Entity {
    state: ObjectState,
    /// Remaining `state()` observations before a transitional state
    /// settles to its terminal state.
    settle_after: u32,
    start_calls: u32,
    stop_calls: u32,
    recycle_calls: u32,
}

impl Entity {
    fn new(state: ObjectState) -> Self {
        Self {
            state,
            settle_after: 0,
            start_calls: 0,
            stop_calls: 0,
            recycle_calls: 0,
        }
    }

    /// Observe the current state, advancing the simulated transition.
    fn observe(&mut self) -> ObjectState {
        let observed = self.state;
        if observed.is_transitional() {
            if self.settle_after == 0 {
                self.state = match observed {
                    ObjectState::Starting => ObjectState::Started,
                    ObjectState::Stopping => ObjectState::Stopped,
                    _ => observed,
                };
            } else {
                self.settle_after -= 1;
            }
        }
        observed
    }
}

/// In-memory [`ServerManager`] implementation.
///
/// Entities keep insertion order so that callers cannot rely on the
/// backend returning sorted names. Site deletion is staged and only
/// takes effect at [`commit()`](ServerManager::commit), mirroring a
/// transactional backend.
pub struct LocalServerManager {
    pools: IndexMap<String, Entity>,
    sites: IndexMap<String, Entity>,
    staged_site_removals: Vec<String>,
    transition_observations: u32,
    fail_state_for: Vec<String>,
    fail_commits: bool,
    commit_calls: u32,
}

impl LocalServerManager {
    pub fn new() -> Self {
        Self {
            pools: IndexMap::new(),
            sites: IndexMap::new(),
            staged_site_removals: Vec::new(),
            transition_observations: DEFAULT_TRANSITION_OBSERVATIONS,
            fail_state_for: Vec::new(),
            fail_commits: false,
            commit_calls: 0,
        }
    }

    // ── Builders ─────────────────────────────────────────────────────

    pub fn with_pool(mut self, name: impl Into<String>, state: ObjectState) -> Self {
        self.pools.insert(name.into(), Entity::new(state));
        self
    }

    pub fn with_site(mut self, name: impl Into<String>, state: ObjectState) -> Self {
        self.sites.insert(name.into(), Entity::new(state));
        self
    }

    /// Override how many observations a transitional state survives.
    pub fn transition_observations(mut self, observations: u32) -> Self {
        self.transition_observations = observations;
        self
    }

    // ── Fault injection ──────────────────────────────────────────────

    /// Make every `state()` query for `name` fail with a backend fault.
    pub fn fail_state_for(&mut self, name: impl Into<String>) {
        self.fail_state_for.push(name.into());
    }

    /// Make every `commit()` fail.
    pub fn set_fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn start_calls(&self, kind: EntityKind, name: &str) -> u32 {
        self.entity(kind, name).map_or(0, |e| e.start_calls)
    }

    pub fn stop_calls(&self, kind: EntityKind, name: &str) -> u32 {
        self.entity(kind, name).map_or(0, |e| e.stop_calls)
    }

    pub fn recycle_calls(&self, name: &str) -> u32 {
        self.entity(EntityKind::Pool, name)
            .map_or(0, |e| e.recycle_calls)
    }

    pub fn commit_calls(&self) -> u32 {
        self.commit_calls
    }

    /// Current state without advancing the simulated transition.
    pub fn peek_state(&self, kind: EntityKind, name: &str) -> Option<ObjectState> {
        self.entity(kind, name).map(|e| e.state)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn collection(&self, kind: EntityKind) -> &IndexMap<String, Entity> {
        match kind {
            EntityKind::Pool => &self.pools,
            EntityKind::Site => &self.sites,
        }
    }

    fn collection_mut(&mut self, kind: EntityKind) -> &mut IndexMap<String, Entity> {
        match kind {
            EntityKind::Pool => &mut self.pools,
            EntityKind::Site => &mut self.sites,
        }
    }

    fn entity(&self, kind: EntityKind, name: &str) -> Option<&Entity> {
        self.collection(kind).get(name)
    }

    fn entity_mut(&mut self, kind: EntityKind, name: &str) -> Result<&mut Entity, AdminError> {
        self.collection_mut(kind)
            .get_mut(name)
            .ok_or_else(|| AdminError::not_found(kind, name))
    }
}

impl Default for LocalServerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerManager for LocalServerManager {
    fn names(&mut self, kind: EntityKind) -> Result<Vec<String>, AdminError> {
        Ok(self.collection(kind).keys().cloned().collect())
    }

    fn state(&mut self, kind: EntityKind, name: &str) -> Result<ObjectState, AdminError> {
        if self.fail_state_for.iter().any(|n| n == name) {
            return Err(AdminError::backend(format!(
                "simulated state fault for {name}"
            )));
        }
        Ok(self.entity_mut(kind, name)?.observe())
    }

    fn start(&mut self, kind: EntityKind, name: &str) -> Result<(), AdminError> {
        let observations = self.transition_observations;
        let entity = self.entity_mut(kind, name)?;
        entity.start_calls += 1;
        if entity.state != ObjectState::Started {
            entity.state = ObjectState::Starting;
            entity.settle_after = observations;
        }
        Ok(())
    }

    fn stop(&mut self, kind: EntityKind, name: &str) -> Result<(), AdminError> {
        let observations = self.transition_observations;
        let entity = self.entity_mut(kind, name)?;
        entity.stop_calls += 1;
        if entity.state != ObjectState::Stopped {
            entity.state = ObjectState::Stopping;
            entity.settle_after = observations;
        }
        Ok(())
    }

    fn recycle_pool(&mut self, name: &str) -> Result<ObjectState, AdminError> {
        let entity = self.entity_mut(EntityKind::Pool, name)?;
        entity.recycle_calls += 1;
        entity.state = ObjectState::Started;
        entity.settle_after = 0;
        Ok(entity.state)
    }

    fn delete_site(&mut self, name: &str) -> Result<(), AdminError> {
        // Staging a site that is already gone is fine -- the caller's
        // exists() check after commit() decides the outcome.
        if self.sites.contains_key(name) {
            self.staged_site_removals.push(name.to_owned());
        }
        Ok(())
    }

    fn exists(&mut self, kind: EntityKind, name: &str) -> Result<bool, AdminError> {
        Ok(self.collection(kind).contains_key(name))
    }

    fn commit(&mut self) -> Result<(), AdminError> {
        self.commit_calls += 1;
        if self.fail_commits {
            return Err(AdminError::Commit {
                message: "simulated commit failure".into(),
            });
        }
        for name in self.staged_site_removals.drain(..) {
            debug!(site = %name, "removing site from configuration");
            self.sites.shift_remove(&name);
        }
        Ok(())
    }
}

// ── Shared wrapper ───────────────────────────────────────────────────

/// Cloneable wrapper around a [`LocalServerManager`].
///
/// The gate takes ownership of the `ServerManager` it guards; tests
/// hand it a clone of this wrapper and keep another clone around to
/// inspect call counters afterwards.
#[derive(Clone)]
pub struct SharedServerManager {
    inner: Arc<Mutex<LocalServerManager>>,
}

impl SharedServerManager {
    pub fn new(manager: LocalServerManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Run `f` against the wrapped manager.
    pub fn with<R>(&self, f: impl FnOnce(&mut LocalServerManager) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl ServerManager for SharedServerManager {
    fn names(&mut self, kind: EntityKind) -> Result<Vec<String>, AdminError> {
        self.with(|m| m.names(kind))
    }

    fn state(&mut self, kind: EntityKind, name: &str) -> Result<ObjectState, AdminError> {
        self.with(|m| m.state(kind, name))
    }

    fn start(&mut self, kind: EntityKind, name: &str) -> Result<(), AdminError> {
        self.with(|m| m.start(kind, name))
    }

    fn stop(&mut self, kind: EntityKind, name: &str) -> Result<(), AdminError> {
        self.with(|m| m.stop(kind, name))
    }

    fn recycle_pool(&mut self, name: &str) -> Result<ObjectState, AdminError> {
        self.with(|m| m.recycle_pool(name))
    }

    fn delete_site(&mut self, name: &str) -> Result<(), AdminError> {
        self.with(|m| m.delete_site(name))
    }

    fn exists(&mut self, kind: EntityKind, name: &str) -> Result<bool, AdminError> {
        self.with(|m| m.exists(kind, name))
    }

    fn commit(&mut self) -> Result<(), AdminError> {
        self.with(LocalServerManager::commit)
    }
}
