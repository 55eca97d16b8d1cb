use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        snapshot::PartySnapshot,
        sse::{ServerEvent, SnapshotEvent},
    },
    state::SharedState,
};

pub const EVENT_PARTY_SNAPSHOT: &str = "party.snapshot";
pub const EVENT_PARTY_UPDATED: &str = "party.updated";

/// Initial event sent to a subscriber right after it connects.
pub fn snapshot_event(snapshot: &PartySnapshot) -> Option<ServerEvent> {
    encode(EVENT_PARTY_SNAPSHOT, &SnapshotEvent { snapshot })
}

/// Broadcast the refreshed snapshot to every subscriber of the party.
pub fn broadcast_party_updated(state: &SharedState, snapshot: &PartySnapshot) {
    if let Some(event) = encode(EVENT_PARTY_UPDATED, &SnapshotEvent { snapshot }) {
        state.sse().broadcast(&snapshot.code, event);
    }
}

fn encode(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize party SSE payload");
            None
        }
    }
}
