use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::{party_service, sse_events},
    state::SharedState,
};

/// Subscribe to a party's updates, returning the receiver together with the
/// initial `party.snapshot` event.
///
/// The receiver is registered before the snapshot is read so no update
/// committed in between is lost.
pub async fn subscribe_party(
    state: &SharedState,
    code: &str,
) -> Result<(broadcast::Receiver<ServerEvent>, Option<ServerEvent>), ServiceError> {
    let code = code.trim().to_uppercase();
    party_service::resolve_party_id(state, &code).await?;
    let receiver = state.sse().subscribe(&code);
    let snapshot = party_service::get_snapshot(state, &code).await?;
    Ok((receiver, sse_events::snapshot_event(&snapshot)))
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Convert a broadcast receiver into an SSE response, emitting `initial`
/// first and forwarding events until the client disconnects.
pub fn to_sse_stream(
    code: String,
    initial: Option<ServerEvent>,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(initial) = initial {
            if tx.send(Ok(to_event(initial))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // every event carries a full snapshot, the next one catches up
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }

        info!(party = %code, "party SSE stream disconnected");
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
