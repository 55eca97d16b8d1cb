use std::{
    collections::HashSet,
    time::{Duration, SystemTime},
};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::state::SharedState;

use super::party_service;

/// Enforce phase deadlines every `period`, forever.
///
/// Each tick also drops expired store records, the locks of parties that are
/// no longer active, and SSE hubs nobody listens to.
pub async fn run(state: SharedState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        tick(&state).await;
    }
}

/// Single pass of the supervisor.
pub async fn tick(state: &SharedState) {
    match party_service::enforce_deadlines(state, SystemTime::now()).await {
        Ok(changed) if !changed.is_empty() => {
            debug!(parties = changed.len(), "deadline tick changed parties")
        }
        Ok(_) => {}
        Err(err) => warn!(error = %err, "deadline tick failed"),
    }

    match state.store().purge_expired().await {
        Ok(0) => {}
        Ok(purged) => debug!(purged, "expired records purged"),
        Err(err) => warn!(error = %err, "failed to purge expired records"),
    }

    match state.store().list_active_parties().await {
        Ok(active) => {
            let released = state.prune_party_locks(&active.into_iter().collect::<HashSet<_>>());
            if released > 0 {
                debug!(released, "party locks released");
            }
        }
        Err(err) => warn!(error = %err, "failed to list active parties"),
    }

    let pruned = state.sse().prune();
    if pruned > 0 {
        debug!(pruned, "idle SSE hubs pruned");
    }
}
