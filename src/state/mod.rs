pub mod game;
mod sse;
pub mod state_machine;

use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{config::AppConfig, dao::party_store::PartyStore};

pub use self::sse::{SseHub, SseState};

pub type SharedState = Arc<AppState>;

/// Central application state: the injected store, per-party locks and SSE hubs.
pub struct AppState {
    store: Arc<dyn PartyStore>,
    config: AppConfig,
    party_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    sse: SseState,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(store: Arc<dyn PartyStore>, config: AppConfig) -> SharedState {
        let sse = SseState::new(config.sse_capacity());
        Arc::new(Self {
            store,
            config,
            party_locks: DashMap::new(),
            sse,
        })
    }

    /// Storage backend shared by every operation.
    pub fn store(&self) -> &Arc<dyn PartyStore> {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Per-party SSE hubs.
    pub fn sse(&self) -> &SseState {
        &self.sse
    }

    /// Serialize every mutation of a party: the guard must be held across
    /// the whole load, mutate and persist span.
    pub async fn lock_party(&self, party_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .party_locks
            .entry(party_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock of a party nobody is currently waiting on.
    pub fn forget_party(&self, party_id: Uuid) {
        self.party_locks
            .remove_if(&party_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Drop the idle locks of parties outside `active`; returns how many went.
    pub fn prune_party_locks(&self, active: &HashSet<Uuid>) -> usize {
        let before = self.party_locks.len();
        self.party_locks
            .retain(|party_id, lock| active.contains(party_id) || Arc::strong_count(lock) > 1);
        before - self.party_locks.len()
    }

    /// Number of parties holding a lock entry.
    pub fn tracked_parties(&self) -> usize {
        self.party_locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::party_store::memory::MemoryPartyStore;

    #[tokio::test]
    async fn idle_locks_of_inactive_parties_are_pruned() {
        let state = AppState::new(Arc::new(MemoryPartyStore::new()), AppConfig::default());
        let active = Uuid::new_v4();
        let stale = Uuid::new_v4();
        let busy = Uuid::new_v4();
        for party_id in [active, stale, busy] {
            drop(state.lock_party(party_id).await);
        }
        let _held = state.lock_party(busy).await;

        assert_eq!(state.prune_party_locks(&HashSet::from([active])), 1);
        assert_eq!(state.tracked_parties(), 2);
    }
}
