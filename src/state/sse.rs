use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
///
/// Each party code owns its own hub, created on first subscription.
pub struct SseState {
    hubs: DashMap<String, SseHub>,
    capacity: usize,
}

impl SseState {
    /// Build the SSE sub-tree; every hub uses `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Register a new subscriber for the party identified by `code`.
    pub fn subscribe(&self, code: &str) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(code.to_string())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Send an event to the subscribers of a party, if any.
    pub fn broadcast(&self, code: &str, event: ServerEvent) {
        if let Some(hub) = self.hubs.get(code) {
            hub.broadcast(event);
        }
    }

    /// Drop hubs that no longer have any listener.
    pub fn prune(&self) -> usize {
        let before = self.hubs.len();
        self.hubs.retain(|_, hub| hub.receiver_count() > 0);
        before - self.hubs.len()
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_only_reach_the_matching_party() {
        let sse = SseState::new(4);
        let mut first = sse.subscribe("AAAAA");
        let mut second = sse.subscribe("BBBBB");

        sse.broadcast("AAAAA", ServerEvent::new(Some("party.updated".into()), "{}".into()));

        let received = first.recv().await.unwrap();
        assert_eq!(received.event.as_deref(), Some("party.updated"));
        assert!(second.try_recv().is_err());
    }

    #[test]
    fn prune_drops_hubs_without_listeners() {
        let sse = SseState::new(4);
        let kept = sse.subscribe("AAAAA");
        drop(sse.subscribe("BBBBB"));

        assert_eq!(sse.prune(), 1);
        assert!(kept.is_empty());
    }
}
